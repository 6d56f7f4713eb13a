//! Token-level Earley parser with a morphology-aware grammar algebra.
//!
//! Grammars are built from composable [`Rule`] values over token
//! [`Predicate`]s, parsed with [`Parser::findall`] into non-overlapping
//! [`Match`]es, optionally filtered by grammatical agreement, and
//! interpreted into [`Fact`] records.

#[macro_use]
extern crate lazy_static;

pub mod earley;
pub mod error;
pub mod interpret;
pub mod morph;
pub mod parser;
pub mod predicate;
pub mod relations;
pub mod rules;
pub mod token;
pub mod tree;

pub use crate::error::Error;
pub use crate::interpret::fact::{AttrDef, Fact, Schema, Slot, Value};
pub use crate::interpret::spec::Spec;
pub use crate::interpret::Interpreter;
pub use crate::morph::{MorphAnalyzer, MorphParse, TableMorph};
pub use crate::parser::{GrammarCache, Parser, PartialMatch};
pub use crate::predicate::Predicate;
pub use crate::relations::Relation;
pub use crate::rules::{
  forward, optional, or_rule, repeatable, rule, rule_alts, rule_main, Production, Rule, Term,
};
pub use crate::token::{GramSet, MorphForm, Token, TokenKind};
pub use crate::tree::{Match, ParseTree};
