//! value — the input model accepted by warm-up.
//!
//! Scalars plus two structured kinds. Structured children are held behind
//! `Arc` so an input graph can express sharing: the same node referenced from
//! two keys (or two positions inside one value). The codec preserves that
//! sharing across a snapshot round-trip (see codec::tree graph encoding).
//! Cycles are not constructible with immutable Arcs.

use std::sync::Arc;

use serde_json::Number;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Arc<Value>>),
    /// Insertion-ordered key/value pairs.
    Map(Vec<(String, Arc<Value>)>),
}

impl Value {
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Map(_))
    }

    /// Shorthand used all over the tests.
    pub fn str(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

// ----------------- JSON bridge (CLI input / display) -----------------

/// Convert parsed JSON into a Value. JSON-sourced values never share nodes.
/// Numbers become Int when they fit i64, Float otherwise.
pub fn from_json(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => {
            Value::Array(items.iter().map(|it| Arc::new(from_json(it))).collect())
        }
        serde_json::Value::Object(map) => Value::Map(
            map.iter()
                .map(|(k, it)| (k.clone(), Arc::new(from_json(it))))
                .collect(),
        ),
    }
}

/// Render a Value as JSON. Non-finite floats have no JSON representation and
/// render as null.
pub fn to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => match Number::from_f64(*f) {
            Some(n) => serde_json::Value::Number(n),
            None => serde_json::Value::Null,
        },
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|it| to_json(it)).collect())
        }
        Value::Map(pairs) => {
            let mut out = serde_json::Map::new();
            for (k, it) in pairs {
                out.insert(k.clone(), to_json(it));
            }
            serde_json::Value::Object(out)
        }
    }
}
