use std::collections::HashMap;

use crate::token::GramSet;

/// One analyzer reading of a surface word
#[derive(Debug, Clone, PartialEq)]
pub struct MorphParse {
  pub normal_form: String,
  pub grams: GramSet,
}

impl MorphParse {
  pub fn new<S, I, G>(normal_form: S, grams: I) -> Self
  where
    S: Into<String>,
    I: IntoIterator<Item = G>,
    G: Into<String>,
  {
    Self {
      normal_form: normal_form.into(),
      grams: grams.into_iter().map(Into::into).collect(),
    }
  }
}

/// The external morphological service. The parser core never calls it;
/// the tagger collaborator uses `parse` to enrich tokens, and the
/// interpreter's inflected specs use `inflect`.
pub trait MorphAnalyzer: Send + Sync {
  fn parse(&self, word: &str) -> Vec<MorphParse>;

  /// Deduplicated lemmas, in first-seen order
  fn normal_forms(&self, word: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for parse in self.parse(word) {
      if !seen.contains(&parse.normal_form) {
        seen.push(parse.normal_form);
      }
    }
    seen
  }

  /// Best-effort inflection of one reading toward the target grammemes.
  /// `None` when the analyzer has no suitable form.
  fn inflect(&self, parse: &MorphParse, target: &GramSet) -> Option<String>;
}

/// Table entry: a surface form with its grammemes, grouped under a lemma
#[derive(Debug, Clone)]
pub struct TableEntry {
  pub normal_form: String,
  pub word: String,
  pub grams: GramSet,
}

/// In-memory analyzer over a closed vocabulary. Enough for tests and for
/// small fixed dictionaries; real deployments plug in an external
/// dictionary-backed analyzer behind the same trait.
#[derive(Debug, Default)]
pub struct TableMorph {
  by_word: HashMap<String, Vec<TableEntry>>,
  by_lemma: HashMap<String, Vec<TableEntry>>,
}

impl TableMorph {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn add<S, W, I, G>(&mut self, normal_form: S, word: W, grams: I)
  where
    S: Into<String>,
    W: Into<String>,
    I: IntoIterator<Item = G>,
    G: Into<String>,
  {
    let entry = TableEntry {
      normal_form: normal_form.into(),
      word: word.into().to_lowercase(),
      grams: grams.into_iter().map(Into::into).collect(),
    };
    self
      .by_lemma
      .entry(entry.normal_form.clone())
      .or_default()
      .push(entry.clone());
    self.by_word.entry(entry.word.clone()).or_default().push(entry);
  }
}

impl MorphAnalyzer for TableMorph {
  fn parse(&self, word: &str) -> Vec<MorphParse> {
    self
      .by_word
      .get(&word.to_lowercase())
      .map(|entries| {
        entries
          .iter()
          .map(|e| MorphParse {
            normal_form: e.normal_form.clone(),
            grams: e.grams.clone(),
          })
          .collect()
      })
      .unwrap_or_default()
  }

  fn inflect(&self, parse: &MorphParse, target: &GramSet) -> Option<String> {
    let entries = self.by_lemma.get(&parse.normal_form)?;
    entries
      .iter()
      .max_by_key(|e| target.intersection(&e.grams).count())
      .filter(|e| target.is_subset(&e.grams))
      .map(|e| e.word.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn target(tags: &[&str]) -> GramSet {
    tags.iter().map(|t| t.to_string()).collect()
  }

  fn fixture() -> TableMorph {
    let mut m = TableMorph::new();
    m.add("иванов", "иванов", vec!["NOUN", "Surn", "masc", "sing", "nomn"]);
    m.add("иванов", "иванова", vec!["NOUN", "Surn", "masc", "sing", "gent"]);
    m.add("иванов", "иванову", vec!["NOUN", "Surn", "masc", "sing", "datv"]);
    m
  }

  #[test]
  fn test_parse_and_normal_forms() {
    let m = fixture();
    assert_eq!(m.parse("ИВАНОВУ").len(), 1);
    assert_eq!(m.normal_forms("иванова"), vec!["иванов".to_string()]);
    assert!(m.parse("петров").is_empty());
  }

  #[test]
  fn test_inflect() {
    let m = fixture();
    let parse = m.parse("иванову").remove(0);
    assert_eq!(m.inflect(&parse, &target(&["nomn"])), Some("иванов".to_string()));
    assert_eq!(m.inflect(&parse, &target(&["loct"])), None);
  }
}
