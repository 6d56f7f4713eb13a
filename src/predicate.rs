use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::token::{Token, TokenKind};

/// Opaque user-supplied token test
pub type CustomPredicate = Arc<dyn Fn(&Token) -> bool + Send + Sync>;

/// A pure test over a single token, used as the terminal alphabet of the
/// grammar algebra. Kept as a tagged enum rather than a closure so that
/// grammars stay inspectable; the one escape hatch is `Custom`.
#[derive(Clone)]
pub enum Predicate {
  Eq(String),
  Caseless(String),
  In(HashSet<String>),
  InCaseless(HashSet<String>),
  Kind(TokenKind),
  LengthEq(usize),
  Gte(i64),
  Lte(i64),
  Gram(String),
  Normalized(String),
  Dictionary(HashSet<String>),
  Capitalized,
  Upper,
  Lower,
  Title,
  And(Vec<Predicate>),
  Or(Vec<Predicate>),
  Not(Box<Predicate>),
  Custom(CustomPredicate),
}

impl Predicate {
  pub fn matches(&self, t: &Token) -> bool {
    match self {
      Self::Eq(v) => t.value == *v,
      Self::Caseless(v) => t.value.to_lowercase() == *v,
      Self::In(set) => set.contains(&t.value),
      Self::InCaseless(set) => set.contains(&t.value.to_lowercase()),
      Self::Kind(k) => t.kind == *k,
      Self::LengthEq(n) => t.value.chars().count() == *n,
      Self::Gte(n) => int_value(t).map(|v| v >= *n).unwrap_or(false),
      Self::Lte(n) => int_value(t).map(|v| v <= *n).unwrap_or(false),
      Self::Gram(g) => t.forms.iter().any(|f| f.has_gram(g)),
      Self::Normalized(w) => t.forms.iter().any(|f| f.normalized.to_lowercase() == *w),
      Self::Dictionary(set) => t.forms.iter().any(|f| set.contains(&f.normalized.to_lowercase())),
      Self::Capitalized => capitalized_str(&t.value),
      Self::Upper => upper_str(&t.value),
      Self::Lower => lower_str(&t.value),
      Self::Title => title_str(&t.value),
      Self::And(ps) => ps.iter().all(|p| p.matches(t)),
      Self::Or(ps) => ps.iter().any(|p| p.matches(t)),
      Self::Not(p) => !p.matches(t),
      Self::Custom(f) => f(t),
    }
  }
}

/// `gte`/`lte` are guarded: a non-integer token fails both
fn int_value(t: &Token) -> Option<i64> {
  if t.kind == TokenKind::Int {
    t.value.parse().ok()
  } else {
    None
  }
}

/// First char is uppercase and the word has a distinct lowercase form
fn capitalized_str(s: &str) -> bool {
  match s.chars().next() {
    Some(c) => c.is_uppercase() && s.to_lowercase() != s,
    None => false,
  }
}

/// All cased chars are uppercase, and at least one is cased
fn upper_str(s: &str) -> bool {
  let mut cased = false;
  for c in s.chars() {
    if c.is_lowercase() {
      return false;
    }
    cased |= c.is_uppercase();
  }
  cased
}

fn lower_str(s: &str) -> bool {
  let mut cased = false;
  for c in s.chars() {
    if c.is_uppercase() {
      return false;
    }
    cased |= c.is_lowercase();
  }
  cased
}

/// First char uppercase, the rest lowercase
fn title_str(s: &str) -> bool {
  let mut chars = s.chars();
  match chars.next() {
    Some(c) => c.is_uppercase() && chars.all(|c| !c.is_uppercase()),
    None => false,
  }
}

pub fn eq<S: Into<String>>(v: S) -> Predicate {
  Predicate::Eq(v.into())
}

pub fn caseless<S: Into<String>>(v: S) -> Predicate {
  Predicate::Caseless(v.into().to_lowercase())
}

pub fn in_<I, S>(values: I) -> Predicate
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  Predicate::In(values.into_iter().map(Into::into).collect())
}

pub fn in_caseless<I, S>(values: I) -> Predicate
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  Predicate::InCaseless(values.into_iter().map(|v| v.into().to_lowercase()).collect())
}

pub fn kind(k: TokenKind) -> Predicate {
  Predicate::Kind(k)
}

pub fn length_eq(n: usize) -> Predicate {
  Predicate::LengthEq(n)
}

pub fn gte(n: i64) -> Predicate {
  Predicate::Gte(n)
}

pub fn lte(n: i64) -> Predicate {
  Predicate::Lte(n)
}

pub fn gram<S: Into<String>>(g: S) -> Predicate {
  Predicate::Gram(g.into())
}

pub fn normalized<S: Into<String>>(w: S) -> Predicate {
  Predicate::Normalized(w.into().to_lowercase())
}

pub fn dictionary<I, S>(lemmas: I) -> Predicate
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  Predicate::Dictionary(lemmas.into_iter().map(|v| v.into().to_lowercase()).collect())
}

/// Alias for `dictionary`
pub fn normalized_in<I, S>(lemmas: I) -> Predicate
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  dictionary(lemmas)
}

pub fn is_capitalized() -> Predicate {
  Predicate::Capitalized
}

pub fn is_upper() -> Predicate {
  Predicate::Upper
}

pub fn is_lower() -> Predicate {
  Predicate::Lower
}

pub fn is_title() -> Predicate {
  Predicate::Title
}

pub fn and_<I: IntoIterator<Item = Predicate>>(ps: I) -> Predicate {
  Predicate::And(ps.into_iter().collect())
}

pub fn or_<I: IntoIterator<Item = Predicate>>(ps: I) -> Predicate {
  Predicate::Or(ps.into_iter().collect())
}

pub fn not_(p: Predicate) -> Predicate {
  Predicate::Not(Box::new(p))
}

pub fn custom<F>(f: F) -> Predicate
where
  F: Fn(&Token) -> bool + Send + Sync + 'static,
{
  Predicate::Custom(Arc::new(f))
}

impl fmt::Debug for Predicate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Eq(v) => write!(f, "eq({:?})", v),
      Self::Caseless(v) => write!(f, "caseless({:?})", v),
      Self::In(s) => write!(f, "in_({:?})", s),
      Self::InCaseless(s) => write!(f, "in_caseless({:?})", s),
      Self::Kind(k) => write!(f, "kind({:?})", k),
      Self::LengthEq(n) => write!(f, "length_eq({})", n),
      Self::Gte(n) => write!(f, "gte({})", n),
      Self::Lte(n) => write!(f, "lte({})", n),
      Self::Gram(g) => write!(f, "gram({:?})", g),
      Self::Normalized(w) => write!(f, "normalized({:?})", w),
      Self::Dictionary(s) => write!(f, "dictionary({:?})", s),
      Self::Capitalized => write!(f, "is_capitalized"),
      Self::Upper => write!(f, "is_upper"),
      Self::Lower => write!(f, "is_lower"),
      Self::Title => write!(f, "is_title"),
      Self::And(ps) => write!(f, "and_({:?})", ps),
      Self::Or(ps) => write!(f, "or_({:?})", ps),
      Self::Not(p) => write!(f, "not_({:?})", p),
      Self::Custom(_) => write!(f, "custom(..)"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::token::MorphForm;

  fn word(v: &str) -> Token {
    Token::new(v, TokenKind::Word, 0, v.chars().count())
  }

  fn int(v: &str) -> Token {
    Token::new(v, TokenKind::Int, 0, v.len())
  }

  #[test]
  fn test_value_predicates() {
    assert!(eq("ст").matches(&word("ст")));
    assert!(!eq("ст").matches(&word("Ст")));
    assert!(caseless("СТ").matches(&word("ст")));
    assert!(in_(vec!["а", "б"]).matches(&word("б")));
    assert!(in_caseless(vec!["Москва"]).matches(&word("МОСКВА")));
    assert!(length_eq(2).matches(&word("юг")));
  }

  #[test]
  fn test_int_guards() {
    assert!(gte(10).matches(&int("15")));
    assert!(!gte(10).matches(&int("9")));
    assert!(lte(31).matches(&int("15")));
    // a word never satisfies a numeric bound
    assert!(!gte(0).matches(&word("15")));
    assert!(!lte(100).matches(&word("пять")));
  }

  #[test]
  fn test_morph_predicates() {
    let t = word("иванову")
      .with_forms(vec![MorphForm::new("иванов", vec!["NOUN", "Surn", "masc", "datv"])]);
    assert!(gram("Surn").matches(&t));
    assert!(!gram("femn").matches(&t));
    assert!(normalized("Иванов").matches(&t));
    assert!(dictionary(vec!["иванов", "петров"]).matches(&t));
    // no forms, no morphology
    assert!(!gram("Surn").matches(&word("иванову")));
  }

  #[test]
  fn test_shape_predicates() {
    assert!(is_capitalized().matches(&word("Иван")));
    assert!(!is_capitalized().matches(&word("иван")));
    assert!(is_upper().matches(&word("МГУ")));
    assert!(!is_upper().matches(&word("МГу")));
    assert!(is_lower().matches(&word("мгу")));
    assert!(is_title().matches(&word("Иван")));
    assert!(!is_title().matches(&word("ИВАН")));
  }

  #[test]
  fn test_combinators() {
    let p = and_(vec![kind(TokenKind::Int), gte(1), lte(31)]);
    assert!(p.matches(&int("15")));
    assert!(!p.matches(&int("40")));
    assert!(or_(vec![eq("янв"), eq("фев")]).matches(&word("фев")));
    assert!(not_(eq("янв")).matches(&word("фев")));
    assert!(custom(|t: &Token| t.value.len() % 2 == 0).matches(&word("юг")));
  }
}
