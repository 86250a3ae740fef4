//! The canonical model state
//!
//! A [`State`] is an immutable mapping of named fields to JSON values.
//! Every mutation produces a new `State`; the field map sits behind an
//! `Arc` so snapshots retained by the version history share storage
//! with the live value until one of them changes.

use crate::error::ValidationError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Content hash of a state, stable across processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

/// Immutable snapshot of the whole model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    fields: Arc<BTreeMap<String, Value>>,
}

impl State {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from `(field, value)` pairs
    pub fn from_fields<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            fields: Arc::new(fields.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    /// Build a state from a JSON object
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(map) => Ok(Self::from_fields(map)),
            other => Err(ValidationError::new(format!(
                "state must be an object, got {}",
                kind_of(&other)
            ))),
        }
    }

    /// Build a state from any serializable struct
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, ValidationError> {
        let value =
            serde_json::to_value(value).map_err(|e| ValidationError::new(e.to_string()))?;
        Self::from_value(value)
    }

    /// Decode the whole state into a typed struct
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ValidationError> {
        serde_json::from_value(self.to_value()).map_err(|e| ValidationError::new(e.to_string()))
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Get a field as an integer
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    /// Get a field as a float
    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    /// Get a field as a string slice
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Get a field as a bool
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    /// Get an integer field, failing validation if absent or mistyped
    pub fn require_i64(&self, field: &str) -> Result<i64, ValidationError> {
        self.get_i64(field)
            .ok_or_else(|| ValidationError::at(field, "expected an integer field in state"))
    }

    /// Check whether a field is present
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Return a new state with one field set
    pub fn with(&self, field: impl Into<String>, value: impl Into<Value>) -> State {
        let mut fields = (*self.fields).clone();
        fields.insert(field.into(), value.into());
        Self {
            fields: Arc::new(fields),
        }
    }

    /// Return a new state with one field removed
    pub fn without(&self, field: &str) -> State {
        if !self.contains(field) {
            return self.clone();
        }
        let mut fields = (*self.fields).clone();
        fields.remove(field);
        Self {
            fields: Arc::new(fields),
        }
    }

    /// Return a new state with several fields replaced
    pub fn merge<K, I>(&self, updates: I) -> State
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut fields = (*self.fields).clone();
        for (k, v) in updates {
            fields.insert(k.into(), v);
        }
        Self {
            fields: Arc::new(fields),
        }
    }

    /// Iterate over fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert to a JSON object value
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(map)
    }

    /// Compute the content fingerprint
    ///
    /// Object keys are hashed in sorted order so the result does not
    /// depend on insertion order.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.fields.len() as u64).to_le_bytes());
        for (key, value) in self.fields.iter() {
            hash_str(&mut hasher, key);
            hash_value(&mut hasher, value);
        }
        Fingerprint(*hasher.finalize().as_bytes())
    }

    /// True if both states share the same field storage
    pub fn ptr_eq(&self, other: &State) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for State {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self::from_fields(iter)
    }
}

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_value(hasher: &mut blake3::Hasher, value: &Value) {
    match value {
        Value::Null => {
            hasher.update(&[0]);
        }
        Value::Bool(b) => {
            hasher.update(&[1, *b as u8]);
        }
        Value::Number(n) => {
            hasher.update(&[2]);
            hash_str(hasher, &n.to_string());
        }
        Value::String(s) => {
            hasher.update(&[3]);
            hash_str(hasher, s);
        }
        Value::Array(items) => {
            hasher.update(&[4]);
            hasher.update(&(items.len() as u64).to_le_bytes());
            for item in items {
                hash_value(hasher, item);
            }
        }
        Value::Object(map) => {
            hasher.update(&[5]);
            hasher.update(&(map.len() as u64).to_le_bytes());
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                hash_str(hasher, key);
                hash_value(hasher, &map[key.as_str()]);
            }
        }
    }
}

/// Short name of a JSON value's type, for error messages
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_produces_new_state() {
        let s0 = State::from_fields([("count", json!(0))]);
        let s1 = s0.with("count", 1);

        assert_eq!(s0.get_i64("count"), Some(0));
        assert_eq!(s1.get_i64("count"), Some(1));
        assert!(!s0.ptr_eq(&s1));
    }

    #[test]
    fn test_clone_shares_storage() {
        let s0 = State::from_fields([("a", json!("x"))]);
        let s1 = s0.clone();
        assert!(s0.ptr_eq(&s1));
    }

    #[test]
    fn test_from_value_requires_object() {
        assert!(State::from_value(json!({"a": 1})).is_ok());
        let err = State::from_value(json!([1, 2])).unwrap_err();
        assert!(err.message.contains("array"));
    }

    #[test]
    fn test_fingerprint_is_content_based() {
        let a = State::from_fields([("x", json!(1)), ("y", json!({"b": 2, "a": 1}))]);
        let b = State::new().with("y", json!({"a": 1, "b": 2})).with("x", 1);
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = b.with("x", 2);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_fingerprint_distinguishes_types() {
        let a = State::from_fields([("x", json!(1))]);
        let b = State::from_fields([("x", json!("1"))]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_decode_typed() {
        #[derive(Deserialize)]
        struct Counter {
            count: i64,
        }

        let state = State::from_fields([("count", json!(7))]);
        let counter: Counter = state.decode().unwrap();
        assert_eq!(counter.count, 7);
    }

    #[test]
    fn test_serde_transparent() {
        let state = State::from_fields([("count", json!(3))]);
        let text = serde_json::to_string(&state).unwrap();
        assert_eq!(text, r#"{"count":3}"#);

        let back: State = serde_json::from_str(&text).unwrap();
        assert_eq!(back, state);
    }
}
