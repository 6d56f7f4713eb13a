use std::fmt;

use itertools::Itertools;

use crate::earley::{Chart, Child, StateRef};
use crate::error::Error;
use crate::interpret::fact::Value;
use crate::interpret::Interpreter;
use crate::relations;
use crate::rules::Rule;
use crate::token::Token;

/// Typed parse tree reconstructed from completed Earley states: rule nodes
/// over token leaves, one child per consumed term
#[derive(Debug, Clone)]
pub enum ParseTree {
  Node {
    rule: Rule,
    production: usize,
    children: Vec<ParseTree>,
  },
  Leaf(Token),
}

impl ParseTree {
  pub fn is_leaf(&self) -> bool {
    matches!(self, Self::Leaf(_))
  }

  pub fn leaf(&self) -> Option<&Token> {
    match self {
      Self::Leaf(t) => Some(t),
      _ => None,
    }
  }

  pub fn children(&self) -> &[ParseTree] {
    match self {
      Self::Node { children, .. } => children,
      Self::Leaf(_) => &[],
    }
  }

  /// Descendant leaves, left to right
  pub fn leaves(&self) -> Vec<&Token> {
    let mut out = Vec::new();
    self.collect_leaves(&mut out);
    out
  }

  fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Token>) {
    match self {
      Self::Leaf(t) => out.push(t),
      Self::Node { children, .. } => {
        for child in children {
          child.collect_leaves(out);
        }
      }
    }
  }
}

impl fmt::Display for ParseTree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(t) => write!(f, "{}", t),
      Self::Node { rule, children, .. } => {
        match rule.name() {
          Some(name) => write!(f, "({}", name)?,
          None => write!(f, "(<rule>")?,
        }
        for child in children {
          let fmt = format!("{}", child);
          for line in fmt.lines() {
            write!(f, "\n  {}", line)?;
          }
        }
        write!(f, ")")
      }
    }
  }
}

/// One non-overlapping grammar hit over the input: the matched rule, the
/// consumed token slice and its reconstructed parse tree.
/// `start`/`stop` are token indices; character offsets come from `span`.
#[derive(Debug, Clone)]
pub struct Match {
  rule: Rule,
  tokens: Vec<Token>,
  start: usize,
  stop: usize,
  tree: ParseTree,
}

impl Match {
  /// Expands a completed root state into a Match by walking its child
  /// pointers. Duplicate states kept their first-inserted children, so the
  /// expansion is the leftmost derivation.
  pub(crate) fn from_state(chart: &Chart, candidate: StateRef, input: &[Token]) -> Self {
    let state = chart.node(candidate);
    let (stop, start) = (candidate.0, state.start);
    Self {
      rule: state.rule.clone(),
      tokens: input[start..stop].to_vec(),
      start,
      stop,
      tree: build_tree(chart, candidate, input),
    }
  }

  pub fn rule(&self) -> &Rule {
    &self.rule
  }

  pub fn tokens(&self) -> &[Token] {
    &self.tokens
  }

  /// Token-index range `[start, stop)` in the input
  pub fn start(&self) -> usize {
    self.start
  }

  pub fn stop(&self) -> usize {
    self.stop
  }

  /// Character span `(first token start, last token stop)`; `(0, 0)` for
  /// an empty match
  pub fn span(&self) -> (usize, usize) {
    match (self.tokens.first(), self.tokens.last()) {
      (Some(first), Some(last)) => (first.start, last.stop),
      _ => (0, 0),
    }
  }

  /// Space-joined token values. Not canonical: callers that need faithful
  /// surface text should slice the source by `span`.
  pub fn text(&self) -> String {
    self.tokens.iter().map(|t| t.value.as_str()).join(" ")
  }

  pub fn tree(&self) -> &ParseTree {
    &self.tree
  }

  /// Runs the agreement validator over the parse tree
  pub fn valid_relations(&self) -> bool {
    relations::validate(&self.tree)
  }

  /// Interprets the parse tree into a Fact or primitive value
  pub fn fact(&self, interpreter: &Interpreter) -> Result<Value, Error> {
    interpreter.interpret(&self.tree)
  }
}

fn build_tree(chart: &Chart, sref: StateRef, input: &[Token]) -> ParseTree {
  let state = chart.node(sref);
  let children = state
    .children
    .iter()
    .map(|child| match child {
      Child::Leaf(token_idx) => ParseTree::Leaf(input[*token_idx].clone()),
      Child::Node(sub) => build_tree(chart, *sub, input),
    })
    .collect();
  ParseTree::Node {
    rule: state.rule.clone(),
    production: state.prod_idx,
    children,
  }
}
