use thiserror::Error;

/// Errors surfaced by grammar construction and interpretation.
///
/// Parsing itself never fails: a grammar that does not match an input
/// produces an empty result list.
#[derive(Debug, Error)]
pub enum Error {
  /// `repeatable` called with impossible bounds.
  #[error("invalid repetition bounds: min={}, max={}", .min, max_display(.max))]
  InvalidRepetition { min: usize, max: Option<usize> },

  /// A grammar name was requested from a cache that never compiled it.
  #[error("undefined rule {0}")]
  UndefinedRule(String),

  /// A user-supplied interpretation function failed.
  #[error("interpretation: {0}")]
  Interpretation(String),
}

fn max_display(max: &Option<usize>) -> String {
  match max {
    Some(n) => n.to_string(),
    None => "unbounded".to_string(),
  }
}
