//! Actions, payloads and payload schemas
//!
//! Actions carry no behavior: an [`Action`] is a name plus a [`Payload`].
//! Each registered action declares a [`PayloadSchema`] that is checked
//! before its acceptor runs, so acceptors only see payloads of the shape
//! they were written for.

use crate::error::ValidationError;
use crate::state::kind_of;
use samloop_types::ActionName;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Arbitrary action argument, `null` when absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Value);

impl Payload {
    /// The empty payload
    pub fn none() -> Self {
        Self(Value::Null)
    }

    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    /// Build a payload from any serializable value
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, ValidationError> {
        serde_json::to_value(value)
            .map(Self)
            .map_err(|e| ValidationError::new(e.to_string()))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_null()
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Decode into a typed payload struct
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ValidationError> {
        T::deserialize(&self.0).map_err(|e| ValidationError::new(e.to_string()))
    }

    /// The payload itself as an integer
    pub fn as_i64(&self) -> Result<i64, ValidationError> {
        self.0.as_i64().ok_or_else(|| {
            ValidationError::new(format!("expected integer payload, got {}", kind_of(&self.0)))
        })
    }

    /// An integer field of an object payload
    pub fn field_i64(&self, field: &str) -> Result<i64, ValidationError> {
        self.0
            .get(field)
            .and_then(Value::as_i64)
            .ok_or_else(|| ValidationError::at(field, "expected an integer"))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named operation plus its argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: ActionName,
    #[serde(default)]
    pub payload: Payload,
}

impl Action {
    /// Create an action with an empty payload
    pub fn new(name: impl Into<ActionName>) -> Self {
        Self {
            name: name.into(),
            payload: Payload::none(),
        }
    }

    pub fn with_payload(name: impl Into<ActionName>, payload: impl Into<Payload>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payload.is_none() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}({})", self.name, self.payload)
        }
    }
}

/// Expected shape of a payload
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadSchema {
    /// Any value, including null
    Any,
    /// Only null
    Empty,
    Bool,
    /// Integral number
    Integer,
    /// Any number
    Number,
    String,
    /// Array whose items all match the inner schema
    Array(Box<PayloadSchema>),
    /// Object with the given fields; unlisted fields are allowed
    Object(BTreeMap<String, PayloadSchema>),
    /// Null or a value matching the inner schema
    Optional(Box<PayloadSchema>),
}

impl PayloadSchema {
    /// Object schema from `(field, schema)` pairs
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, PayloadSchema)>,
    {
        PayloadSchema::Object(fields.into_iter().map(|(k, s)| (k.into(), s)).collect())
    }

    pub fn array(items: PayloadSchema) -> Self {
        PayloadSchema::Array(Box::new(items))
    }

    pub fn optional(inner: PayloadSchema) -> Self {
        PayloadSchema::Optional(Box::new(inner))
    }

    /// Check a payload against this schema
    pub fn validate(&self, payload: &Payload) -> Result<(), ValidationError> {
        self.check(payload.value())
    }

    fn check(&self, value: &Value) -> Result<(), ValidationError> {
        match (self, value) {
            (PayloadSchema::Any, _) => Ok(()),
            (PayloadSchema::Optional(_), Value::Null) => Ok(()),
            (PayloadSchema::Optional(inner), v) => inner.check(v),
            (PayloadSchema::Empty, Value::Null) => Ok(()),
            (PayloadSchema::Bool, Value::Bool(_)) => Ok(()),
            (PayloadSchema::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(()),
            (PayloadSchema::Number, Value::Number(_)) => Ok(()),
            (PayloadSchema::String, Value::String(_)) => Ok(()),
            (PayloadSchema::Array(items), Value::Array(values)) => {
                for (i, v) in values.iter().enumerate() {
                    items.check(v).map_err(|e| e.nested(&i.to_string()))?;
                }
                Ok(())
            }
            (PayloadSchema::Object(fields), Value::Object(map)) => {
                for (name, schema) in fields {
                    match map.get(name) {
                        Some(v) => schema.check(v).map_err(|e| e.nested(name))?,
                        None if schema.accepts_missing() => {}
                        None => return Err(ValidationError::at(name, "missing required field")),
                    }
                }
                Ok(())
            }
            (expected, actual) => Err(ValidationError::new(format!(
                "expected {}, got {}",
                expected.describe(),
                kind_of(actual)
            ))),
        }
    }

    fn accepts_missing(&self) -> bool {
        matches!(
            self,
            PayloadSchema::Any | PayloadSchema::Empty | PayloadSchema::Optional(_)
        )
    }

    fn describe(&self) -> &'static str {
        match self {
            PayloadSchema::Any => "anything",
            PayloadSchema::Empty => "no payload",
            PayloadSchema::Bool => "bool",
            PayloadSchema::Integer => "integer",
            PayloadSchema::Number => "number",
            PayloadSchema::String => "string",
            PayloadSchema::Array(_) => "array",
            PayloadSchema::Object(_) => "object",
            PayloadSchema::Optional(_) => "optional value",
        }
    }
}

impl Default for PayloadSchema {
    fn default() -> Self {
        PayloadSchema::Any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_schemas() {
        assert!(PayloadSchema::Integer.validate(&Payload::new(15)).is_ok());
        assert!(PayloadSchema::Integer.validate(&Payload::new(1.5)).is_err());
        assert!(PayloadSchema::Number.validate(&Payload::new(1.5)).is_ok());
        assert!(PayloadSchema::Empty.validate(&Payload::none()).is_ok());
        assert!(PayloadSchema::Empty.validate(&Payload::new(true)).is_err());
        assert!(PayloadSchema::Any.validate(&Payload::new("x")).is_ok());
    }

    #[test]
    fn test_object_schema_reports_path() {
        let schema = PayloadSchema::object([
            ("name", PayloadSchema::String),
            ("tags", PayloadSchema::array(PayloadSchema::String)),
            ("note", PayloadSchema::optional(PayloadSchema::String)),
        ]);

        let ok = Payload::new(json!({"name": "a", "tags": ["x", "y"]}));
        assert!(schema.validate(&ok).is_ok());

        let missing = Payload::new(json!({"tags": []}));
        let err = schema.validate(&missing).unwrap_err();
        assert_eq!(err.path.as_deref(), Some("name"));

        let bad_item = Payload::new(json!({"name": "a", "tags": ["x", 3]}));
        let err = schema.validate(&bad_item).unwrap_err();
        assert_eq!(err.path.as_deref(), Some("tags.1"));
        assert!(err.message.contains("expected string, got integer"));
    }

    #[test]
    fn test_payload_decode() {
        #[derive(Deserialize)]
        struct Add {
            amount: i64,
        }

        let payload = Payload::new(json!({"amount": 4}));
        let add: Add = payload.decode().unwrap();
        assert_eq!(add.amount, 4);
        assert_eq!(payload.field_i64("amount").unwrap(), 4);

        assert!(Payload::new("oops").decode::<Add>().is_err());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::new("reset").to_string(), "reset");
        assert_eq!(Action::with_payload("add", json!(15)).to_string(), "add(15)");
    }
}
