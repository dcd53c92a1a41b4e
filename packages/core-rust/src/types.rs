use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Generic runtime value carried by property reads/writes, action
/// arguments/results and event payloads.
///
/// Supports all JSON-compatible types plus binary data. Converts to and from
/// `serde_json::Value` so protocol bindings can put it on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// JSON null.
    #[default]
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer (signed 64-bit).
    Int(i64),
    /// JSON floating-point (64-bit IEEE 754).
    Float(f64),
    /// JSON string (UTF-8).
    String(String),
    /// Binary data (not directly representable in JSON).
    Bytes(Vec<u8>),
    /// JSON array (ordered sequence of values).
    Array(Vec<Value>),
    /// JSON object. Uses `BTreeMap` for deterministic ordering.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the string slice if this is a `Value::String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is a `Value::Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns `true` for `Value::Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                // u64 beyond i64::MAX and all fractional numbers land here.
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            // NaN and infinities have no JSON form and become null.
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s),
            Value::Bytes(bytes) => {
                serde_json::Value::Array(bytes.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Keyword arguments passed to an action invocation.
pub type ActionArgs = BTreeMap<String, Value>;

/// The three interaction namespaces of a Thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionKind {
    /// Readable and/or writable state.
    Property,
    /// Invocable process.
    Action,
    /// Notification source.
    Event,
}

impl InteractionKind {
    /// Lower-case name used in log fields and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::Property => "property",
            InteractionKind::Action => "action",
            InteractionKind::Event => "event",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a Thing. Cheap to clone; interactions hold one as their
/// back-reference to the owning Thing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThingId(Arc<str>);

impl ThingId {
    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ThingId {
    fn from(v: &str) -> Self {
        Self(Arc::from(v))
    }
}

impl fmt::Display for ThingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_converts_to_sorted_map() {
        let json = serde_json::json!({"b": 1, "a": [true, null, "x"], "c": 1.5});
        let value = Value::from(json);

        let Value::Map(map) = value else {
            panic!("expected map");
        };
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(map["b"], Value::Int(1));
        assert_eq!(map["c"], Value::Float(1.5));
        assert_eq!(
            map["a"],
            Value::Array(vec![
                Value::Bool(true),
                Value::Null,
                Value::String("x".to_string())
            ])
        );
    }

    #[test]
    fn value_to_json_maps_bytes_to_number_array() {
        let json = serde_json::Value::from(Value::Bytes(vec![1, 2]));
        assert_eq!(json, serde_json::json!([1, 2]));
    }

    #[test]
    fn nan_float_becomes_json_null() {
        let json = serde_json::Value::from(Value::Float(f64::NAN));
        assert!(json.is_null());
    }

    #[test]
    fn accessors_return_none_for_other_variants() {
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::Int(3).as_str(), None);
        assert_eq!(Value::from(7).as_int(), Some(7));
        assert!(Value::default().is_null());
    }

    #[test]
    fn thing_id_displays_inner_string() {
        let id = ThingId::from("lamp-1");
        assert_eq!(id.to_string(), "lamp-1");
        assert_eq!(id.as_str(), "lamp-1");
    }
}
