use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::earley::{completed_roots, parse_chart};
use crate::error::Error;
use crate::rules::Rule;
use crate::token::Token;
use crate::tree::Match;

/// A non-completed root state, reported for autocomplete-style queries
#[derive(Debug, Clone)]
pub struct PartialMatch {
  pub name: Option<String>,
  pub production: usize,
  pub dot: usize,
  pub terms: usize,
  pub start: usize,
  pub stop: usize,
}

impl PartialMatch {
  /// Share of the production already consumed
  pub fn progress(&self) -> f64 {
    self.dot as f64 / self.terms as f64
  }
}

/// Compiled entry point for one grammar. A parser is a pure function of
/// its input: no state survives a call, so one instance can serve many
/// threads, each parsing its own input.
#[derive(Debug, Clone)]
pub struct Parser {
  root: Rule,
}

impl Parser {
  pub fn new(root: Rule) -> Self {
    Self { root }
  }

  pub fn rule(&self) -> &Rule {
    &self.root
  }

  /// All non-overlapping matches, sorted by start.
  ///
  /// Candidates failing their agreement relations are dropped first; the
  /// survivors are taken greedily, earliest start first and longest span
  /// winning within a start position.
  pub fn findall(&self, tokens: &[Token]) -> Vec<Match> {
    let chart = parse_chart(&self.root, tokens);
    let candidates = completed_roots(&chart, &self.root);
    let total = candidates.len();

    let mut matches: Vec<Match> = candidates
      .into_iter()
      .map(|state| Match::from_state(&chart, state, tokens))
      .filter(Match::valid_relations)
      .collect();
    matches.sort_by_key(|m| (m.start(), Reverse(m.stop() - m.start())));

    let mut accepted: Vec<Match> = Vec::new();
    for m in matches {
      let overlaps = accepted
        .iter()
        .any(|a| a.start() < m.stop() && m.start() < a.stop());
      if !overlaps {
        accepted.push(m);
      }
    }

    debug!(candidates = total, accepted = accepted.len(), "findall finished");
    accepted
  }

  /// The first match of `findall`, if any
  pub fn find(&self, tokens: &[Token]) -> Option<Match> {
    self.findall(tokens).into_iter().next()
  }

  /// Non-completed root states ranked by how far their dot progressed,
  /// one per rule name. `findall` is unaffected by this operation.
  pub fn partial_matches(&self, tokens: &[Token]) -> Vec<PartialMatch> {
    let chart = parse_chart(&self.root, tokens);
    let id = self.root.id();

    let mut partials = Vec::new();
    for k in 0..chart.len() {
      for state in chart.column(k).states() {
        if state.rule.id() == id && !state.is_complete() {
          partials.push(PartialMatch {
            name: state.rule.name(),
            production: state.prod_idx,
            dot: state.dot,
            terms: state.production.len(),
            start: state.start,
            stop: k,
          });
        }
      }
    }

    partials.sort_by(|a, b| {
      b.progress()
        .partial_cmp(&a.progress())
        .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen = HashSet::new();
    partials.retain(|p| seen.insert(p.name.clone()));
    partials
  }
}

/// Memoizes compiled parsers by grammar name. Initialization is
/// idempotent: under concurrent compilation of the same name the first
/// published parser wins and the rest are dropped.
#[derive(Default)]
pub struct GrammarCache {
  parsers: RwLock<HashMap<String, Arc<Parser>>>,
}

impl GrammarCache {
  pub fn new() -> Self {
    Default::default()
  }

  /// Looks `name` up, compiling and publishing it on first use
  pub fn get_or_compile<F>(&self, name: &str, build: F) -> Arc<Parser>
  where
    F: FnOnce() -> Rule,
  {
    if let Some(parser) = self.parsers.read().unwrap().get(name) {
      return parser.clone();
    }
    let built = Arc::new(Parser::new(build()));
    self
      .parsers
      .write()
      .unwrap()
      .entry(name.to_string())
      .or_insert(built)
      .clone()
  }

  /// Looks up an already-compiled grammar
  pub fn get(&self, name: &str) -> Result<Arc<Parser>, Error> {
    self
      .parsers
      .read()
      .unwrap()
      .get(name)
      .cloned()
      .ok_or_else(|| Error::UndefinedRule(name.to_string()))
  }
}
