//! JSON conversion for document values.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use serde_json::{Map, Number};

impl Value {
    /// Converts this value to JSON.
    ///
    /// Instants are written as RFC 3339 UTC strings.
    ///
    /// # Errors
    ///
    /// Fails on non-finite floats and on instants outside the calendar range.
    pub fn to_json(&self) -> CodecResult<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::Number(Number::from(*n)),
            Value::Float(f) => {
                serde_json::Value::Number(Number::from_f64(*f).ok_or(CodecError::NonFiniteFloat)?)
            }
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Instant(t) => serde_json::Value::String(t.to_rfc3339()?),
            Value::Array(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<CodecResult<_>>()?,
            ),
            Value::Map(fields) => {
                let mut object = Map::new();
                for (key, value) in fields {
                    object.insert(key.clone(), value.to_json()?);
                }
                serde_json::Value::Object(object)
            }
        })
    }

    /// Converts JSON into a value.
    ///
    /// JSON has no temporal type, so strings stay `Text`; callers that know a
    /// field holds an instant re-type it with [`crate::Timestamp::parse_rfc3339`].
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(object) => Value::Map(
                object
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Encodes this value as compact JSON bytes.
    ///
    /// # Errors
    ///
    /// See [`Value::to_json`].
    pub fn to_json_bytes(&self) -> CodecResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_json()?)?)
    }

    /// Decodes a value from JSON bytes.
    ///
    /// # Errors
    ///
    /// Fails if the bytes are not valid JSON.
    pub fn from_json_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let json: serde_json::Value = serde_json::from_slice(bytes)?;
        Ok(Value::from_json(&json))
    }
}
