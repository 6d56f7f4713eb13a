use std::collections::HashSet;
use std::fmt;

/// Set of OpenCorpora-style grammeme tags, e.g. {"NOUN", "masc", "sing", "nomn"}
pub type GramSet = HashSet<String>;

/// Coarse lexical class of a token, assigned by the external tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
  Word,
  Int,
  Punct,
  Other,
}

/// One morphological reading of a word: its dictionary form plus grammemes.
/// Produced by the external analyzer; the parser core only reads these.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphForm {
  pub normalized: String,
  pub grams: GramSet,
}

impl MorphForm {
  pub fn new<S, I, G>(normalized: S, grams: I) -> Self
  where
    S: Into<String>,
    I: IntoIterator<Item = G>,
    G: Into<String>,
  {
    Self {
      normalized: normalized.into(),
      grams: grams.into_iter().map(Into::into).collect(),
    }
  }

  pub fn has_gram(&self, gram: &str) -> bool {
    self.grams.contains(gram)
  }
}

/// An input token with its character span and morphological readings.
///
/// Tokens are produced externally and are immutable afterwards; enrichment
/// by the morphological tagger builds new tokens with `forms` replaced.
/// A word token with empty `forms` simply carries no morphological
/// information, which makes every morphology predicate fail on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
  pub value: String,
  pub kind: TokenKind,
  pub start: usize,
  pub stop: usize,
  pub forms: Vec<MorphForm>,
}

impl Token {
  pub fn new<S: Into<String>>(value: S, kind: TokenKind, start: usize, stop: usize) -> Self {
    Self {
      value: value.into(),
      kind,
      start,
      stop,
      forms: Vec::new(),
    }
  }

  /// Replaces the morphological readings, consuming self. Used by taggers.
  pub fn with_forms(mut self, forms: Vec<MorphForm>) -> Self {
    self.forms = forms;
    self
  }

  /// Character span of the token in the source text
  pub fn span(&self) -> (usize, usize) {
    (self.start, self.stop)
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}: {}", self.start, self.stop, self.value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_forms_lookup() {
    let t = Token::new("иванов", TokenKind::Word, 0, 6)
      .with_forms(vec![MorphForm::new("иванов", vec!["NOUN", "Surn", "masc"])]);
    assert!(t.forms[0].has_gram("Surn"));
    assert!(!t.forms[0].has_gram("femn"));
    assert_eq!(t.span(), (0, 6));
  }
}
