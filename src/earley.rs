use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::rules::{Production, Rule, RuleId, Term};
use crate::token::Token;

/// Location of a state in the chart: (column, index within column)
pub type StateRef = (usize, usize);

/// Child pointer recorded when a state's dot advances: a scanned token or
/// a completed sub-state
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
  Leaf(usize),
  Node(StateRef),
}

/// Dedup key within one column; the column index supplies `stop`
type StateKey = (RuleId, usize, usize, usize);

/// Progress through one production of one rule, started at `start`.
/// `children` holds one pointer per consumed term.
#[derive(Debug, Clone)]
pub struct State {
  pub rule: Rule,
  pub production: Arc<Production>,
  pub prod_idx: usize,
  pub dot: usize,
  pub start: usize,
  pub children: Vec<Child>,
}

impl State {
  fn new(rule: Rule, prod_idx: usize, production: Arc<Production>, start: usize) -> Self {
    Self {
      rule,
      production,
      prod_idx,
      dot: 0,
      start,
      children: Vec::new(),
    }
  }

  pub fn is_complete(&self) -> bool {
    self.dot == self.production.len()
  }

  pub fn next_term(&self) -> Option<&Term> {
    self.production.terms.get(self.dot)
  }

  fn advance(&self, child: Child) -> Self {
    debug_assert!(!self.is_complete());
    let mut children = self.children.clone();
    children.push(child);
    Self {
      rule: self.rule.clone(),
      production: self.production.clone(),
      prod_idx: self.prod_idx,
      dot: self.dot + 1,
      start: self.start,
      children,
    }
  }

  fn key(&self) -> StateKey {
    (self.rule.id(), self.prod_idx, self.dot, self.start)
  }
}

impl fmt::Display for State {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.rule.name() {
      Some(name) => write!(f, "{} →", name)?,
      None => write!(f, "<rule> →")?,
    }
    for idx in 0..self.production.len() {
      if idx == self.dot {
        write!(f, " ・")?;
      }
      write!(f, " {}", self.production.terms[idx])?;
    }
    if self.is_complete() {
      write!(f, " ・")?;
    }
    Ok(())
  }
}

/// All states with `stop == column index`, plus the lookup indexes that
/// keep complete() and nullable replay O(1) per state
#[derive(Debug, Default)]
pub struct Column {
  states: Vec<State>,
  keys: HashSet<StateKey>,
  /// next-term rule identity -> states waiting on that rule here
  waiting: HashMap<RuleId, Vec<usize>>,
  /// zero-width completions in this column, replayed for parents that
  /// register after the completion happened
  completed_empty: HashMap<RuleId, Vec<usize>>,
}

impl Column {
  pub fn len(&self) -> usize {
    self.states.len()
  }

  pub fn is_empty(&self) -> bool {
    self.states.is_empty()
  }

  pub fn state(&self, idx: usize) -> &State {
    &self.states[idx]
  }

  pub fn states(&self) -> impl Iterator<Item = &State> + '_ {
    self.states.iter()
  }
}

#[derive(Debug)]
pub struct Chart(Vec<Column>);

impl Chart {
  fn new(length: usize) -> Self {
    let mut columns = Vec::with_capacity(length);
    columns.resize_with(length, Column::default);
    Self(columns)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn column(&self, k: usize) -> &Column {
    &self.0[k]
  }

  /// State lookup through a child pointer
  pub fn node(&self, (col, idx): StateRef) -> &State {
    &self.0[col].states[idx]
  }

  /// Get an owned state so that passing around &mut chart stays ergonomic;
  /// the clone is an Arc bump, two smalls and the child list
  fn get_state(&self, k: usize, idx: usize) -> State {
    self.0[k].states[idx].clone()
  }

  /// Adds a state to column `k` unless an equivalent one is already there.
  /// Registers waiting parents and replays zero-width completions that
  /// landed before this parent did.
  fn add(&mut self, k: usize, state: State) {
    if !self.0[k].keys.insert(state.key()) {
      return;
    }

    let idx = self.0[k].states.len();
    let mut replayed = Vec::new();
    if let Some(Term::Rule(r)) = state.next_term() {
      let id = r.id();
      self.0[k].waiting.entry(id).or_default().push(idx);
      if let Some(completed) = self.0[k].completed_empty.get(&id) {
        for &c in completed {
          replayed.push(state.advance(Child::Node((k, c))));
        }
      }
    }
    self.0[k].states.push(state);

    for s in replayed {
      self.add(k, s);
    }
  }
}

impl fmt::Display for Chart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for k in 0..self.len() {
      writeln!(f, "Column {}:", k)?;
      for state in self.0[k].states.iter() {
        writeln!(f, "  {}..{}: {}", state.start, k, state)?;
      }
    }
    Ok(())
  }
}

/// Builds the full chart for `root` over `tokens`.
///
/// Root productions are predicted into every column so matches can start
/// anywhere in the input; state dedup keeps the extra predictions cheap.
pub fn parse_chart(root: &Rule, tokens: &[Token]) -> Chart {
  let mut chart = Chart::new(tokens.len() + 1);

  for k in 0..chart.len() {
    predict(&mut chart, k, root);

    // the column grows while we process it, hence the index loop
    let mut idx = 0;
    while idx < chart.0[k].len() {
      let state = chart.get_state(k, idx);

      if state.is_complete() {
        completer(&mut chart, k, idx, &state);
      } else {
        match state.next_term() {
          Some(Term::Rule(r)) => {
            let r = r.clone();
            predict(&mut chart, k, &r);
          }
          Some(Term::Predicate(_)) => scanner(&mut chart, k, &state, tokens),
          None => unreachable!("incomplete state with no next term"),
        }
      }
      idx += 1;
    }
  }

  chart
}

/// COMPLETE: advance every parent in the origin column waiting on this
/// state's rule
fn completer(chart: &mut Chart, k: usize, idx: usize, state: &State) {
  debug_assert!(state.is_complete());

  let id = state.rule.id();
  if state.start == k {
    chart.0[k].completed_empty.entry(id).or_default().push(idx);
  }

  let parents = match chart.0[state.start].waiting.get(&id) {
    Some(parents) => parents.clone(),
    None => return,
  };
  for p in parents {
    let advanced = chart.0[state.start].states[p].advance(Child::Node((k, idx)));
    chart.add(k, advanced);
  }
}

/// SCAN: advance over the next input token if the predicate accepts it
fn scanner(chart: &mut Chart, k: usize, state: &State, tokens: &[Token]) {
  let predicate = match state.next_term() {
    Some(Term::Predicate(p)) => p,
    _ => unreachable!("scanner called without a predicate term"),
  };
  if k < tokens.len() && predicate.matches(&tokens[k]) {
    chart.add(k + 1, state.advance(Child::Leaf(k)));
  }
}

/// PREDICT: add every production of the rule at dot 0. Forward references
/// resolve here, through the rule handle, to whatever was defined by now.
fn predict(chart: &mut Chart, k: usize, rule: &Rule) {
  let productions = rule.productions();
  if productions.is_empty() {
    warn!(rule = %rule, "predicted a rule with no productions; was a forward reference left undefined?");
  }
  for (prod_idx, production) in productions.into_iter().enumerate() {
    chart.add(k, State::new(rule.clone(), prod_idx, production, k));
  }
}

/// Completed root states anywhere in the chart, in column order. These are
/// the candidate matches before agreement filtering and overlap resolution.
pub fn completed_roots(chart: &Chart, root: &Rule) -> Vec<StateRef> {
  let id = root.id();
  let mut out = Vec::new();
  for k in 0..chart.len() {
    for (idx, state) in chart.0[k].states.iter().enumerate() {
      if state.rule.id() == id && state.is_complete() {
        out.push((k, idx));
      }
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::predicate::eq;
  use crate::rules::{forward, rule, rule_alts, Term};
  use crate::token::TokenKind;

  fn tokens(values: &[&str]) -> Vec<Token> {
    let mut offset = 0;
    values
      .iter()
      .map(|v| {
        let len = v.chars().count();
        let t = Token::new(*v, TokenKind::Word, offset, offset + len);
        offset += len + 1;
        t
      })
      .collect()
  }

  #[test]
  fn test_two_token_sequence() {
    let root = rule(vec![eq("ст"), eq(".")]);
    let input = tokens(&["ст", "."]);
    let chart = parse_chart(&root, &input);
    let roots = completed_roots(&chart, &root);
    assert_eq!(roots.len(), 1);
    let state = chart.node(roots[0]);
    assert_eq!((state.start, roots[0].0), (0, 2));
  }

  #[test]
  fn test_right_recursion_terminates() {
    // R -> a | a R
    let fwd = forward();
    fwd.define(rule_alts(vec![
      vec![Term::from(eq("a"))],
      vec![Term::from(eq("a")), Term::from(&fwd)],
    ]));

    let input = tokens(&["a", "a", "a", "a"]);
    let chart = parse_chart(&fwd, &input);
    let roots = completed_roots(&chart, &fwd);
    // every suffix of every prefix completes: spans (i, j] for i < j
    assert_eq!(roots.len(), 10);
  }

  #[test]
  fn test_dedup_bounds_ambiguous_chart() {
    // S -> a | S S: exponentially many derivations, polynomially many states
    let fwd = forward();
    fwd.define(rule_alts(vec![
      vec![Term::from(eq("a"))],
      vec![Term::from(&fwd), Term::from(&fwd)],
    ]));

    let input = tokens(&["a"; 8]);
    let chart = parse_chart(&fwd, &input);
    let total: usize = (0..chart.len()).map(|k| chart.column(k).len()).sum();
    // N=8: well under the N^3 ceiling, far under the derivation count
    assert!(total < 8 * 8 * 8, "chart blew up: {} states", total);
  }

  #[test]
  fn test_nullable_rule_completes_parent_added_late() {
    // S -> Opt Opt with a shared optional: the second reference registers
    // after the zero-width completion already happened
    let opt = rule_alts(vec![vec![Term::from(eq("x"))], Vec::<Term>::new()]);
    let root = rule(vec![Term::from(&opt), Term::from(&opt)]);

    let chart = parse_chart(&root, &[]);
    let roots = completed_roots(&chart, &root);
    assert_eq!(roots.len(), 1);
  }

  #[test]
  fn test_undefined_forward_matches_nothing() {
    let fwd = forward();
    let root = rule(vec![Term::from(&fwd)]);
    let chart = parse_chart(&root, &tokens(&["a"]));
    assert!(completed_roots(&chart, &root).is_empty());
  }
}
