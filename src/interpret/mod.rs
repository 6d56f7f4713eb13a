pub mod fact;
pub mod spec;

use std::sync::Arc;

use itertools::Itertools;

use crate::error::Error;
use crate::morph::MorphAnalyzer;
use crate::token::{GramSet, Token};
use crate::tree::ParseTree;

use self::fact::{Fact, Schema, Value};
use self::spec::{Producer, Spec};

/// Intermediate result of evaluating one subtree. Span lists accumulate
/// bottom-up so facts can record where their attributes came from.
#[derive(Debug, Clone)]
pub enum Interp {
  Token(Token),
  Value {
    value: Value,
    spans: Vec<(usize, usize)>,
  },
  Attr {
    schema: Arc<Schema>,
    key: String,
    value: Value,
    spans: Vec<(usize, usize)>,
  },
  Fact(Fact),
  /// Forwarded child results of a node without a spec
  Items(Vec<Interp>),
}

impl Interp {
  fn spans(&self) -> Vec<(usize, usize)> {
    match self {
      Self::Token(t) => vec![t.span()],
      Self::Value { spans, .. } | Self::Attr { spans, .. } => spans.clone(),
      Self::Fact(f) => f.spans(),
      Self::Items(items) => items.iter().flat_map(Self::spans).collect(),
    }
  }
}

/// Bottom-up evaluator of interpretation specs over a parse tree.
/// The morphological service is only needed by `inflected` specs; without
/// one they fall back to the surface form.
#[derive(Clone, Default)]
pub struct Interpreter {
  morph: Option<Arc<dyn MorphAnalyzer>>,
}

impl Interpreter {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn with_morph(morph: Arc<dyn MorphAnalyzer>) -> Self {
    Self { morph: Some(morph) }
  }

  /// Evaluates the tree and unwraps the root result into a plain value
  pub fn interpret(&self, tree: &ParseTree) -> Result<Value, Error> {
    Ok(normalize(self.eval(tree)?))
  }

  fn eval(&self, tree: &ParseTree) -> Result<Interp, Error> {
    let (rule, children) = match tree {
      ParseTree::Leaf(t) => return Ok(Interp::Token(t.clone())),
      ParseTree::Node { rule, children, .. } => (rule, children),
    };

    // flatten forwarded results so specs see through spec-less nodes
    let mut kids = Vec::with_capacity(children.len());
    for child in children {
      match self.eval(child)? {
        Interp::Items(items) => kids.extend(items),
        interp => kids.push(interp),
      }
    }

    match rule.interp() {
      None => Ok(Interp::Items(kids)),
      Some(Spec::Fact(schema)) => {
        let mut built = Fact::new(schema.clone());
        for kid in kids {
          built.add_spans(kid.spans());
          match kid {
            Interp::Attr { schema: s, key, value, .. } if s.name() == schema.name() => {
              built.set(key, value);
            }
            Interp::Fact(nested) if nested.name() == schema.name() => built.merge(&nested),
            _ => {}
          }
        }
        Ok(Interp::Fact(built))
      }
      Some(Spec::Attr { schema, key, producer }) => {
        let value = self.produce(&producer, tree, &kids)?;
        let spans = kids.iter().flat_map(Interp::spans).collect();
        Ok(Interp::Attr { schema, key, value, spans })
      }
      Some(Spec::Value(producer)) => {
        let value = self.produce(&producer, tree, &kids)?;
        let spans = kids.iter().flat_map(Interp::spans).collect();
        Ok(Interp::Value { value, spans })
      }
    }
  }

  fn produce(&self, producer: &Producer, tree: &ParseTree, kids: &[Interp]) -> Result<Value, Error> {
    match producer {
      Producer::Child => {
        let mut found = kids.iter().filter(|k| !matches!(k, Interp::Token(_)));
        match (found.next(), found.next()) {
          (Some(only), None) => Ok(child_value(only)),
          _ => Ok(Value::Str(join_values(tree))),
        }
      }
      Producer::Joined => Ok(Value::Str(join_values(tree))),
      Producer::Normalized => Ok(Value::Str(join_normalized(tree))),
      Producer::Inflected(grams) => Ok(Value::Str(self.join_inflected(tree, grams))),
      Producer::Const(v) => Ok(v.clone()),
      Producer::Custom(f) => f(Value::Str(join_values(tree))),
      Producer::CustomChain(fns) => {
        let mut value = Value::Str(join_values(tree));
        for f in fns {
          value = f(value)?;
        }
        Ok(value)
      }
      Producer::NormalizedCustom(f) => f(Value::Str(join_normalized(tree))),
      Producer::InflectedCustom(grams, f) => f(Value::Str(self.join_inflected(tree, grams))),
    }
  }

  fn join_inflected(&self, tree: &ParseTree, grams: &GramSet) -> String {
    tree.leaves().iter().map(|t| self.inflect_word(t, grams)).join(" ")
  }

  /// First inflectable reading wins; no service or no parses falls back to
  /// the surface form
  fn inflect_word(&self, token: &Token, grams: &GramSet) -> String {
    if let Some(morph) = &self.morph {
      for parse in morph.parse(&token.value) {
        if let Some(word) = morph.inflect(&parse, grams) {
          return word;
        }
      }
    }
    token.value.clone()
  }
}

/// The non-forwarded result a plain `attribute` takes as its value
fn child_value(interp: &Interp) -> Value {
  match interp {
    Interp::Value { value, .. } => value.clone(),
    Interp::Attr { value, .. } => value.clone(),
    Interp::Fact(f) => Value::Fact(Box::new(f.clone())),
    Interp::Token(_) | Interp::Items(_) => unreachable!("filtered before child_value"),
  }
}

fn join_values(tree: &ParseTree) -> String {
  tree.leaves().iter().map(|t| t.value.as_str()).join(" ")
}

fn join_normalized(tree: &ParseTree) -> String {
  let mut parts = Vec::new();
  collect_normalized(tree, &mut parts);
  parts.join(" ")
}

/// A rule's pipeline key stands in for its whole subtree; leaves use their
/// first reading's lemma, falling back to the surface form
fn collect_normalized(tree: &ParseTree, parts: &mut Vec<String>) {
  match tree {
    ParseTree::Leaf(t) => parts.push(
      t.forms
        .first()
        .map(|f| f.normalized.clone())
        .unwrap_or_else(|| t.value.clone()),
    ),
    ParseTree::Node { rule, children, .. } => {
      if let Some(key) = rule.pipeline_key() {
        parts.push(key);
        return;
      }
      for child in children {
        collect_normalized(child, parts);
      }
    }
  }
}

/// Root-result unwrapping: facts and values pass through, attributes yield
/// their value, a bare token its surface form, forwarded lists their last
/// element
fn normalize(interp: Interp) -> Value {
  match interp {
    Interp::Fact(f) => Value::Fact(Box::new(f)),
    Interp::Value { value, .. } => value,
    Interp::Attr { value, .. } => value,
    Interp::Token(t) => Value::Str(t.value),
    Interp::Items(mut items) => match items.pop() {
      Some(last) => normalize(last),
      None => Value::Null,
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::interpret::fact::AttrDef;
  use crate::interpret::spec;
  use crate::morph::TableMorph;
  use crate::rules::rule;
  use crate::token::{MorphForm, TokenKind};

  fn leaf(value: &str, start: usize) -> ParseTree {
    let stop = start + value.chars().count();
    ParseTree::Leaf(Token::new(value, TokenKind::Word, start, stop))
  }

  fn node(r: crate::rules::Rule, children: Vec<ParseTree>) -> ParseTree {
    ParseTree::Node { rule: r, production: 0, children }
  }

  #[test]
  fn test_const_and_custom() {
    let tree = node(rule(vec![crate::predicate::eq("x")]).interpretation(spec::const_(true)), vec![leaf("x", 0)]);
    assert_eq!(Interpreter::new().interpret(&tree).unwrap(), Value::Bool(true));

    let upper = node(
      rule(vec![crate::predicate::eq("x")]).interpretation(spec::custom(|v: Value| {
        Ok(Value::Str(v.as_str().unwrap_or_default().to_uppercase()))
      })),
      vec![leaf("st", 0)],
    );
    assert_eq!(
      Interpreter::new().interpret(&upper).unwrap(),
      Value::Str("ST".into())
    );
  }

  #[test]
  fn test_custom_error_propagates() {
    let tree = node(
      rule(vec![crate::predicate::eq("x")])
        .interpretation(spec::custom(|_| Err(Error::Interpretation("boom".into())))),
      vec![leaf("x", 0)],
    );
    assert!(Interpreter::new().interpret(&tree).is_err());
  }

  #[test]
  fn test_normalized_uses_first_form() {
    let token = Token::new("иванову", TokenKind::Word, 0, 7)
      .with_forms(vec![MorphForm::new("иванов", vec!["NOUN"])]);
    let tree = node(
      rule(vec![crate::predicate::gram("NOUN")]).interpretation(spec::normalized()),
      vec![ParseTree::Leaf(token), leaf("без-форм", 8)],
    );
    assert_eq!(
      Interpreter::new().interpret(&tree).unwrap(),
      Value::Str("иванов без-форм".into())
    );
  }

  #[test]
  fn test_pipeline_key_short_circuits() {
    let inner = rule(vec![crate::predicate::eq("районный"), crate::predicate::eq("суд")])
      .with_pipeline_key("районный_суд");
    let tree = node(
      rule(vec![&inner]).interpretation(spec::normalized()),
      vec![node(inner.clone(), vec![leaf("районного", 0), leaf("суда", 10)])],
    );
    assert_eq!(
      Interpreter::new().interpret(&tree).unwrap(),
      Value::Str("районный_суд".into())
    );
  }

  #[test]
  fn test_fact_assembly_with_spans() {
    let schema = Schema::define("Name", vec![AttrDef::scalar("first"), AttrDef::scalar("last")]);
    let first = rule(vec![crate::predicate::gram("Name")])
      .interpretation(spec::attribute(&schema, "first"));
    let last = rule(vec![crate::predicate::gram("Surn")])
      .interpretation(spec::attribute(&schema, "last"));
    let root = rule(vec![&first, &last]).interpretation(spec::fact(&schema));

    let tree = node(
      root,
      vec![
        node(first, vec![leaf("иван", 0)]),
        node(last, vec![leaf("иванов", 5)]),
      ],
    );

    let result = Interpreter::new().interpret(&tree).unwrap();
    let built = match result {
      Value::Fact(f) => f,
      other => panic!("expected a fact, got {:?}", other),
    };
    assert_eq!(built.name(), "Name");
    assert_eq!(built.scalar("first"), Some(&Value::Str("иван".into())));
    assert_eq!(built.scalar("last"), Some(&Value::Str("иванов".into())));
    assert_eq!(built.spans(), vec![(0, 4), (5, 11)]);
  }

  #[test]
  fn test_inflected_falls_back_without_parses() {
    let mut morph = TableMorph::new();
    morph.add("суд", "суд", vec!["NOUN", "sing", "nomn"]);
    morph.add("суд", "суда", vec!["NOUN", "sing", "gent"]);

    let target_nomn = spec::inflected(vec!["nomn"]);
    let tree = node(
      rule(vec![crate::predicate::eq("суда"), crate::predicate::eq("неизвестное")])
        .interpretation(target_nomn),
      vec![leaf("суда", 0), leaf("неизвестное", 5)],
    );

    let interpreter = Interpreter::with_morph(Arc::new(morph));
    // "суда" inflects to nominative, the out-of-vocabulary word passes through
    assert_eq!(
      interpreter.interpret(&tree).unwrap(),
      Value::Str("суд неизвестное".into())
    );
  }

  #[test]
  fn test_custom_chain_applies_in_order() {
    let fns: Vec<spec::CustomFn> = vec![
      Arc::new(|v: Value| {
        Ok(Value::Str(v.as_str().unwrap_or_default().trim_end_matches('.').to_string()))
      }),
      Arc::new(|v: Value| {
        v.as_str()
          .and_then(|s| s.parse::<i64>().ok())
          .map(Value::Int)
          .ok_or_else(|| Error::Interpretation("not an integer".into()))
      }),
    ];
    let tree = node(
      rule(vec![crate::predicate::eq("7.")]).interpretation(spec::custom_chain(fns)),
      vec![leaf("7.", 0)],
    );
    assert_eq!(Interpreter::new().interpret(&tree).unwrap(), Value::Int(7));
  }

  #[test]
  fn test_attribute_takes_unique_child_fact() {
    let date = Schema::define("Date", vec![AttrDef::scalar("year")]);
    let record = Schema::define("Record", vec![AttrDef::scalar("when")]);

    let year = rule(vec![crate::predicate::eq("2024")])
      .interpretation(spec::attr_custom(&date, "year", |v: Value| {
        v.as_str()
          .and_then(|s| s.parse::<i64>().ok())
          .map(Value::Int)
          .ok_or_else(|| Error::Interpretation("not an integer".into()))
      }));
    let inner = rule(vec![&year]).interpretation(spec::fact(&date));
    let when = rule(vec![&inner]).interpretation(spec::attribute(&record, "when"));
    let root = rule(vec![&when]).interpretation(spec::fact(&record));

    let tree = node(
      root,
      vec![node(
        when,
        vec![node(inner, vec![node(year, vec![leaf("2024", 0)])])],
      )],
    );

    let result = Interpreter::new().interpret(&tree).unwrap();
    let outer = match result {
      Value::Fact(f) => f,
      other => panic!("expected a fact, got {:?}", other),
    };
    let nested = match outer.scalar("when") {
      Some(Value::Fact(f)) => f,
      other => panic!("expected a nested fact, got {:?}", other),
    };
    assert_eq!(nested.scalar("year"), Some(&Value::Int(2024)));
    // spans flow out of the nested fact into the outer one
    assert_eq!(outer.spans(), vec![(0, 4)]);
  }

  #[test]
  fn test_items_forwarding_normalizes_to_last() {
    let plain = rule(vec![crate::predicate::eq("a"), crate::predicate::eq("b")]);
    let tree = node(plain, vec![leaf("a", 0), leaf("b", 2)]);
    assert_eq!(
      Interpreter::new().interpret(&tree).unwrap(),
      Value::Str("b".into())
    );
  }
}
