use std::fmt;
use std::sync::Arc;

use serde_json::json;

/// A value produced by interpretation: a primitive or a nested fact
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Bool(bool),
  Int(i64),
  Str(String),
  Fact(Box<Fact>),
}

impl Value {
  pub fn is_null(&self) -> bool {
    matches!(self, Self::Null)
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::Str(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Self::Int(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_json(&self) -> serde_json::Value {
    match self {
      Self::Null => serde_json::Value::Null,
      Self::Bool(b) => json!(b),
      Self::Int(n) => json!(n),
      Self::Str(s) => json!(s),
      Self::Fact(f) => f.as_json(),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Self::Str(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Self::Str(s)
  }
}

impl From<i64> for Value {
  fn from(n: i64) -> Self {
    Self::Int(n)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Self::Bool(b)
  }
}

/// One attribute declaration of a schema
#[derive(Debug, Clone, PartialEq)]
pub struct AttrDef {
  pub name: String,
  pub repeatable: bool,
}

impl AttrDef {
  pub fn scalar<S: Into<String>>(name: S) -> Self {
    Self {
      name: name.into(),
      repeatable: false,
    }
  }

  pub fn repeatable<S: Into<String>>(name: S) -> Self {
    Self {
      name: name.into(),
      repeatable: true,
    }
  }
}

/// A named record shape: ordered attributes, some marked repeatable.
/// Shared by every fact of the schema and by the specs that target it.
#[derive(Debug, PartialEq)]
pub struct Schema {
  name: String,
  attrs: Vec<AttrDef>,
}

impl Schema {
  pub fn define<S: Into<String>>(name: S, attrs: Vec<AttrDef>) -> Arc<Self> {
    Arc::new(Self {
      name: name.into(),
      attrs,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn attrs(&self) -> &[AttrDef] {
    &self.attrs
  }

  fn index(&self, key: &str) -> Option<usize> {
    self.attrs.iter().position(|a| a.name == key)
  }
}

/// Storage for one attribute: nullable scalar or collect-into-list
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
  Scalar(Option<Value>),
  Many(Vec<Value>),
}

impl Slot {
  fn empty(def: &AttrDef) -> Self {
    if def.repeatable {
      Self::Many(Vec::new())
    } else {
      Self::Scalar(None)
    }
  }

  pub fn is_unset(&self) -> bool {
    match self {
      Self::Scalar(v) => v.is_none(),
      Self::Many(vs) => vs.is_empty(),
    }
  }
}

/// A named record produced by interpretation, with the character spans of
/// the tokens that contributed to it
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
  schema: Arc<Schema>,
  slots: Vec<Slot>,
  spans: Vec<(usize, usize)>,
}

impl Fact {
  pub fn new(schema: Arc<Schema>) -> Self {
    let slots = schema.attrs().iter().map(Slot::empty).collect();
    Self {
      schema,
      slots,
      spans: Vec::new(),
    }
  }

  pub fn schema(&self) -> &Arc<Schema> {
    &self.schema
  }

  pub fn name(&self) -> &str {
    self.schema.name()
  }

  pub fn get(&self, key: &str) -> Option<&Slot> {
    self.schema.index(key).map(|idx| &self.slots[idx])
  }

  /// Scalar attribute value; `None` when unset or repeatable
  pub fn scalar(&self, key: &str) -> Option<&Value> {
    match self.get(key) {
      Some(Slot::Scalar(v)) => v.as_ref(),
      _ => None,
    }
  }

  /// Repeatable attribute items, insertion-ordered
  pub fn items(&self, key: &str) -> Option<&[Value]> {
    match self.get(key) {
      Some(Slot::Many(vs)) => Some(vs),
      _ => None,
    }
  }

  /// Overwrites a scalar attribute or appends to a repeatable one.
  /// Keys outside the schema are ignored.
  pub fn set<S: AsRef<str>>(&mut self, key: S, value: Value) {
    if let Some(idx) = self.schema.index(key.as_ref()) {
      match &mut self.slots[idx] {
        Slot::Scalar(slot) => *slot = Some(value),
        Slot::Many(items) => items.push(value),
      }
    }
  }

  /// Copies every set attribute of `source` in: scalars overwrite, lists
  /// extend. Spans merge too.
  pub fn merge(&mut self, source: &Fact) {
    for def in source.schema.attrs() {
      match source.get(&def.name) {
        Some(Slot::Scalar(Some(v))) => self.set(&def.name, v.clone()),
        Some(Slot::Many(items)) => {
          for v in items {
            self.set(&def.name, v.clone());
          }
        }
        _ => {}
      }
    }
    self.add_spans(source.spans.iter().copied());
  }

  pub fn add_spans<I: IntoIterator<Item = (usize, usize)>>(&mut self, spans: I) {
    self.spans.extend(spans);
  }

  /// Ordered union of this fact's spans and every nested fact's spans
  pub fn spans(&self) -> Vec<(usize, usize)> {
    let mut out = self.spans.clone();
    for slot in &self.slots {
      let values: Box<dyn Iterator<Item = &Value>> = match slot {
        Slot::Scalar(v) => Box::new(v.iter()),
        Slot::Many(vs) => Box::new(vs.iter()),
      };
      for value in values {
        if let Value::Fact(f) = value {
          out.extend(f.spans());
        }
      }
    }
    out.sort_unstable();
    out.dedup();
    out
  }

  /// JSON rendering: null scalars are omitted, repeatable attributes are
  /// arrays, nested facts recurse
  pub fn as_json(&self) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (def, slot) in self.schema.attrs().iter().zip(&self.slots) {
      match slot {
        Slot::Scalar(None) => {}
        Slot::Scalar(Some(v)) => {
          map.insert(def.name.clone(), v.as_json());
        }
        Slot::Many(items) => {
          map.insert(
            def.name.clone(),
            serde_json::Value::Array(items.iter().map(Value::as_json).collect()),
          );
        }
      }
    }
    serde_json::Value::Object(map)
  }
}

impl fmt::Display for Fact {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}", self.name(), self.as_json())
  }
}
