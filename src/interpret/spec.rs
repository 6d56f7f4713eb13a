use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::interpret::fact::{Schema, Value};
use crate::token::GramSet;

/// User transformation applied to an interpreted value. Errors propagate
/// to the `fact(match)` caller.
pub type CustomFn = Arc<dyn Fn(Value) -> Result<Value, Error> + Send + Sync>;

/// How a spec computes its value from the node it is attached to
#[derive(Clone)]
pub enum Producer {
  /// The unique non-forwarded child result if there is one, else the
  /// space-joined leaf values. The plain-`attribute` behavior.
  Child,
  /// Space-joined surface values of descendant leaves
  Joined,
  /// Space-joined normalized forms of descendant leaves, or the rule's
  /// pipeline key when one is set
  Normalized,
  /// Space-joined inflections toward the target grammemes
  Inflected(GramSet),
  Const(Value),
  Custom(CustomFn),
  CustomChain(Vec<CustomFn>),
  NormalizedCustom(CustomFn),
  InflectedCustom(GramSet, CustomFn),
}

/// Interpretation node attached to a rule, evaluated bottom-up over the
/// parse tree
#[derive(Clone)]
pub enum Spec {
  /// Build a fact of the schema, absorbing child attributes and
  /// same-schema child facts
  Fact(Arc<Schema>),
  /// Produce one attribute of the schema
  Attr {
    schema: Arc<Schema>,
    key: String,
    producer: Producer,
  },
  /// Produce a bare value
  Value(Producer),
}

pub fn fact(schema: &Arc<Schema>) -> Spec {
  Spec::Fact(schema.clone())
}

pub fn attribute<S: Into<String>>(schema: &Arc<Schema>, key: S) -> Spec {
  Spec::Attr {
    schema: schema.clone(),
    key: key.into(),
    producer: Producer::Child,
  }
}

pub fn normalized() -> Spec {
  Spec::Value(Producer::Normalized)
}

pub fn inflected<I, G>(grams: I) -> Spec
where
  I: IntoIterator<Item = G>,
  G: Into<String>,
{
  Spec::Value(Producer::Inflected(to_grams(grams)))
}

pub fn const_<V: Into<Value>>(v: V) -> Spec {
  Spec::Value(Producer::Const(v.into()))
}

pub fn custom<F>(f: F) -> Spec
where
  F: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
{
  Spec::Value(Producer::Custom(Arc::new(f)))
}

pub fn custom_chain(fns: Vec<CustomFn>) -> Spec {
  Spec::Value(Producer::CustomChain(fns))
}

pub fn normalized_custom<F>(f: F) -> Spec
where
  F: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
{
  Spec::Value(Producer::NormalizedCustom(Arc::new(f)))
}

pub fn inflected_custom<I, G, F>(grams: I, f: F) -> Spec
where
  I: IntoIterator<Item = G>,
  G: Into<String>,
  F: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
{
  Spec::Value(Producer::InflectedCustom(to_grams(grams), Arc::new(f)))
}

pub fn attr_normalized<S: Into<String>>(schema: &Arc<Schema>, key: S) -> Spec {
  attr_with(schema, key, Producer::Normalized)
}

pub fn attr_inflected<S, I, G>(schema: &Arc<Schema>, key: S, grams: I) -> Spec
where
  S: Into<String>,
  I: IntoIterator<Item = G>,
  G: Into<String>,
{
  attr_with(schema, key, Producer::Inflected(to_grams(grams)))
}

pub fn attr_const<S: Into<String>, V: Into<Value>>(schema: &Arc<Schema>, key: S, v: V) -> Spec {
  attr_with(schema, key, Producer::Const(v.into()))
}

pub fn attr_custom<S, F>(schema: &Arc<Schema>, key: S, f: F) -> Spec
where
  S: Into<String>,
  F: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
{
  attr_with(schema, key, Producer::Custom(Arc::new(f)))
}

pub fn attr_normalized_custom<S, F>(schema: &Arc<Schema>, key: S, f: F) -> Spec
where
  S: Into<String>,
  F: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
{
  attr_with(schema, key, Producer::NormalizedCustom(Arc::new(f)))
}

pub fn attr_inflected_custom<S, I, G, F>(schema: &Arc<Schema>, key: S, grams: I, f: F) -> Spec
where
  S: Into<String>,
  I: IntoIterator<Item = G>,
  G: Into<String>,
  F: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
{
  attr_with(schema, key, Producer::InflectedCustom(to_grams(grams), Arc::new(f)))
}

fn attr_with<S: Into<String>>(schema: &Arc<Schema>, key: S, producer: Producer) -> Spec {
  Spec::Attr {
    schema: schema.clone(),
    key: key.into(),
    producer,
  }
}

fn to_grams<I, G>(grams: I) -> GramSet
where
  I: IntoIterator<Item = G>,
  G: Into<String>,
{
  grams.into_iter().map(Into::into).collect()
}

impl fmt::Debug for Producer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Child => write!(f, "child"),
      Self::Joined => write!(f, "joined"),
      Self::Normalized => write!(f, "normalized"),
      Self::Inflected(g) => write!(f, "inflected({:?})", g),
      Self::Const(v) => write!(f, "const({:?})", v),
      Self::Custom(_) => write!(f, "custom(..)"),
      Self::CustomChain(fns) => write!(f, "custom_chain(..{}..)", fns.len()),
      Self::NormalizedCustom(_) => write!(f, "normalized_custom(..)"),
      Self::InflectedCustom(g, _) => write!(f, "inflected_custom({:?}, ..)", g),
    }
  }
}

impl fmt::Debug for Spec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Fact(schema) => write!(f, "fact({})", schema.name()),
      Self::Attr { schema, key, producer } => {
        write!(f, "attr({}.{}, {:?})", schema.name(), key, producer)
      }
      Self::Value(producer) => write!(f, "value({:?})", producer),
    }
  }
}
