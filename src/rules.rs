use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::Error;
use crate::interpret::spec::Spec;
use crate::predicate::Predicate;
use crate::relations::Relation;

/// One term of a production: a token test (terminal) or a rule (non-terminal)
#[derive(Debug, Clone)]
pub enum Term {
  Predicate(Predicate),
  Rule(Rule),
}

impl Term {
  pub fn is_predicate(&self) -> bool {
    matches!(self, Self::Predicate(_))
  }

  pub fn is_rule(&self) -> bool {
    matches!(self, Self::Rule(_))
  }

  pub fn rule(&self) -> Option<&Rule> {
    match self {
      Self::Rule(r) => Some(r),
      _ => None,
    }
  }

  pub fn predicate(&self) -> Option<&Predicate> {
    match self {
      Self::Predicate(p) => Some(p),
      _ => None,
    }
  }
}

impl From<Predicate> for Term {
  fn from(p: Predicate) -> Self {
    Self::Predicate(p)
  }
}

impl From<Rule> for Term {
  fn from(r: Rule) -> Self {
    Self::Rule(r)
  }
}

impl From<&Rule> for Term {
  fn from(r: &Rule) -> Self {
    Self::Rule(r.clone())
  }
}

impl fmt::Display for Term {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Predicate(p) => write!(f, "{:?}", p),
      Self::Rule(r) => match r.name() {
        Some(name) => write!(f, "{}", name),
        None => write!(f, "<rule>"),
      },
    }
  }
}

/// One alternative of a rule. `main` marks the head term used for
/// agreement anchoring.
#[derive(Debug, Clone)]
pub struct Production {
  pub terms: Vec<Term>,
  pub main: usize,
}

impl Production {
  pub fn new(terms: Vec<Term>) -> Self {
    Self { terms, main: 0 }
  }

  pub fn with_main(terms: Vec<Term>, main: usize) -> Self {
    Self { terms, main }
  }

  /// The empty alternative generated by `optional`
  pub fn empty() -> Self {
    Self::new(Vec::new())
  }

  pub fn len(&self) -> usize {
    self.terms.len()
  }

  pub fn is_empty(&self) -> bool {
    self.terms.is_empty()
  }
}

impl fmt::Display for Production {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_empty() {
      return write!(f, "ε");
    }
    for (idx, term) in self.terms.iter().enumerate() {
      if idx > 0 {
        write!(f, " ")?;
      }
      write!(f, "{}", term)?;
    }
    Ok(())
  }
}

#[derive(Debug)]
struct RuleInner {
  name: Option<String>,
  productions: Vec<Arc<Production>>,
  interp: Option<Spec>,
  relation: Option<Relation>,
  pipeline_key: Option<String>,
}

impl RuleInner {
  fn empty() -> Self {
    Self {
      name: None,
      productions: Vec::new(),
      interp: None,
      relation: None,
      pipeline_key: None,
    }
  }
}

/// Stable identity of a rule node. Two `Rule` handles compare equal iff
/// they point at the same node, which is what lets forward references and
/// recursive grammars work: the parser keys its chart and waiting-parent
/// index on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(usize);

/// A grammar node: a named choice of productions, with optional
/// interpretation spec and agreement relation attached.
///
/// `Rule` is a cheap-clone shared handle. Mutation happens through the
/// handle at construction time (`define`, the builder methods); the parser
/// only reads, resolving forward references through the shared interior at
/// lookup time.
#[derive(Debug, Clone)]
pub struct Rule(Arc<RwLock<RuleInner>>);

impl Rule {
  fn from_inner(inner: RuleInner) -> Self {
    Self(Arc::new(RwLock::new(inner)))
  }

  pub fn id(&self) -> RuleId {
    RuleId(Arc::as_ptr(&self.0) as usize)
  }

  pub fn name(&self) -> Option<String> {
    self.0.read().unwrap().name.clone()
  }

  /// Snapshot of the current productions. For a forward reference this is
  /// empty until `define` publishes the definition.
  pub fn productions(&self) -> Vec<Arc<Production>> {
    self.0.read().unwrap().productions.clone()
  }

  pub fn production(&self, idx: usize) -> Arc<Production> {
    self.0.read().unwrap().productions[idx].clone()
  }

  pub fn interp(&self) -> Option<Spec> {
    self.0.read().unwrap().interp.clone()
  }

  pub fn relation(&self) -> Option<Relation> {
    self.0.read().unwrap().relation.clone()
  }

  pub fn pipeline_key(&self) -> Option<String> {
    self.0.read().unwrap().pipeline_key.clone()
  }

  /// Attaches a display/identity tag. Recognition semantics are unchanged.
  pub fn named<S: Into<String>>(self, name: S) -> Self {
    self.0.write().unwrap().name = Some(name.into());
    self
  }

  /// Attaches an interpretation spec, evaluated bottom-up over match trees
  pub fn interpretation(self, spec: Spec) -> Self {
    self.0.write().unwrap().interp = Some(spec);
    self
  }

  /// Attaches an agreement relation checked by the post-hoc validator
  pub fn relation_constraint(self, relation: Relation) -> Self {
    self.0.write().unwrap().relation = Some(relation);
    self
  }

  /// Attaches an opaque phrase key that short-circuits normalized joining
  pub fn with_pipeline_key<S: Into<String>>(self, key: S) -> Self {
    self.0.write().unwrap().pipeline_key = Some(key.into());
    self
  }

  /// Publishes productions (and name) into a `forward()` placeholder.
  /// Every reference made before this call observes the definition
  /// afterwards, because references share the placeholder's interior.
  pub fn define(&self, body: Rule) {
    if self.id() == body.id() {
      return;
    }
    let productions;
    let name;
    {
      let body = body.0.read().unwrap();
      productions = body.productions.clone();
      name = body.name.clone();
    }
    let mut inner = self.0.write().unwrap();
    inner.productions = productions;
    if inner.name.is_none() {
      inner.name = name;
    }
  }
}

impl PartialEq for Rule {
  fn eq(&self, other: &Self) -> bool {
    self.id() == other.id()
  }
}

impl Eq for Rule {}

impl std::hash::Hash for Rule {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.id().hash(state);
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.name() {
      Some(name) => write!(f, "{} ->", name)?,
      None => write!(f, "<rule> ->")?,
    }
    for (idx, prod) in self.productions().iter().enumerate() {
      if idx > 0 {
        write!(f, " |")?;
      }
      write!(f, " {}", prod)?;
    }
    Ok(())
  }
}

/// A rule with a single production
pub fn rule<I, T>(terms: I) -> Rule
where
  I: IntoIterator<Item = T>,
  T: Into<Term>,
{
  let terms = terms.into_iter().map(Into::into).collect();
  Rule::from_inner(RuleInner {
    productions: vec![Arc::new(Production::new(terms))],
    ..RuleInner::empty()
  })
}

/// A rule with a single production whose head term is `main`, used as the
/// anchor for agreement relations
pub fn rule_main<I, T>(terms: I, main: usize) -> Rule
where
  I: IntoIterator<Item = T>,
  T: Into<Term>,
{
  let terms = terms.into_iter().map(Into::into).collect();
  Rule::from_inner(RuleInner {
    productions: vec![Arc::new(Production::with_main(terms, main))],
    ..RuleInner::empty()
  })
}

/// A rule with one production per alternative
pub fn rule_alts<I, J, T>(alts: I) -> Rule
where
  I: IntoIterator<Item = J>,
  J: IntoIterator<Item = T>,
  T: Into<Term>,
{
  let productions = alts
    .into_iter()
    .map(|terms| Arc::new(Production::new(terms.into_iter().map(Into::into).collect())))
    .collect();
  Rule::from_inner(RuleInner {
    productions,
    ..RuleInner::empty()
  })
}

/// Concatenates the productions of all inputs into one rule. Nested
/// `or_rule`s flatten for free since their productions are inlined.
pub fn or_rule<I: IntoIterator<Item = Rule>>(rules: I) -> Rule {
  let productions = rules.into_iter().flat_map(|r| r.productions()).collect();
  Rule::from_inner(RuleInner {
    productions,
    ..RuleInner::empty()
  })
}

/// A copy of `r` with an additional empty production. Interpretation,
/// relation and pipeline key carry over to the copy.
pub fn optional(r: &Rule) -> Rule {
  let inner = r.0.read().unwrap();
  let mut productions = inner.productions.clone();
  productions.push(Arc::new(Production::empty()));
  Rule::from_inner(RuleInner {
    name: inner.name.clone(),
    productions,
    interp: inner.interp.clone(),
    relation: inner.relation.clone(),
    pipeline_key: inner.pipeline_key.clone(),
  })
}

/// A placeholder rule with stable identity and no productions yet.
/// Fill it in with [`Rule::define`]; parsing against an undefined forward
/// reference matches nothing.
pub fn forward() -> Rule {
  Rule::from_inner(RuleInner::empty())
}

/// `min..=max` repetitions of `r`; `max: None` is unbounded.
///
/// Unbounded repetition becomes the forward-referencing rule
/// `R' -> r | r R'`; bounded repetition unrolls into `min` fixed copies
/// followed by a nested optional chain up to `max`.
pub fn repeatable(r: &Rule, min: usize, max: Option<usize>) -> Result<Rule, Error> {
  match max {
    Some(m) if m < 1 || min > m => return Err(Error::InvalidRepetition { min, max }),
    _ => {}
  }

  let built = match max {
    None => {
      let tail = unbounded(r);
      match min {
        0 => optional(&tail),
        1 => tail,
        n => {
          let mut terms: Vec<Term> = std::iter::repeat(r).map(Into::into).take(n - 1).collect();
          terms.push(tail.into());
          rule(terms)
        }
      }
    }
    Some(m) => {
      let mut tail: Option<Rule> = None;
      for _ in min..m {
        let mut terms: Vec<Term> = vec![r.into()];
        if let Some(t) = tail {
          terms.push(t.into());
        }
        tail = Some(optional(&rule(terms)));
      }
      match (min, tail) {
        (0, Some(t)) => t,
        (n, tail) => {
          let mut terms: Vec<Term> = std::iter::repeat(r).map(Into::into).take(n).collect();
          if let Some(t) = tail {
            terms.push(t.into());
          }
          rule(terms)
        }
      }
    }
  };
  Ok(built)
}

/// `R' -> r | r R'`
fn unbounded(r: &Rule) -> Rule {
  let fwd = forward();
  let body = rule_alts(vec![
    vec![Term::from(r)],
    vec![Term::from(r), Term::from(&fwd)],
  ]);
  fwd.define(body);
  fwd
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::predicate::eq;

  #[test]
  fn test_identity() {
    let a = rule(vec![eq("a")]);
    let b = a.clone();
    let c = rule(vec![eq("a")]);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.id(), b.id());
  }

  #[test]
  fn test_or_rule_inlines() {
    let a = rule(vec![eq("a")]);
    let b = rule_alts(vec![vec![eq("b")], vec![eq("c")]]);
    let both = or_rule(vec![a, b]);
    assert_eq!(both.productions().len(), 3);

    let nested = or_rule(vec![both, rule(vec![eq("d")])]);
    assert_eq!(nested.productions().len(), 4);
  }

  #[test]
  fn test_optional_copies() {
    let a = rule(vec![eq("a")]).named("a");
    let opt = optional(&a);
    assert_ne!(a, opt);
    assert_eq!(opt.productions().len(), 2);
    assert!(opt.productions()[1].is_empty());
    assert_eq!(opt.name().as_deref(), Some("a"));
    // the original is untouched
    assert_eq!(a.productions().len(), 1);
  }

  #[test]
  fn test_forward_defines_through_references() {
    let fwd = forward();
    // reference the placeholder before it is defined
    let outer = rule(vec![Term::from(&fwd)]);
    assert!(fwd.productions().is_empty());

    fwd.define(rule(vec![eq("x")]).named("x"));

    let seen = outer.productions()[0].terms[0].rule().cloned();
    let seen = seen.expect("term should be a rule");
    assert_eq!(seen, fwd);
    assert_eq!(seen.productions().len(), 1);
    assert_eq!(seen.name().as_deref(), Some("x"));
  }

  #[test]
  fn test_repeatable_bounds() {
    let a = rule(vec![eq("a")]);
    assert!(repeatable(&a, 2, Some(1)).is_err());
    assert!(repeatable(&a, 0, Some(0)).is_err());
    assert!(repeatable(&a, 0, None).is_ok());
    assert!(repeatable(&a, 3, Some(3)).is_ok());
  }

  #[test]
  fn test_unbounded_shape() {
    let a = rule(vec![eq("a")]);
    let rep = repeatable(&a, 1, None).unwrap();
    let prods = rep.productions();
    assert_eq!(prods.len(), 2);
    assert_eq!(prods[0].len(), 1);
    assert_eq!(prods[1].len(), 2);
    // the recursive tail points back at the repetition rule itself
    assert_eq!(prods[1].terms[1].rule().cloned().map(|r| r.id()), Some(rep.id()));
  }
}
