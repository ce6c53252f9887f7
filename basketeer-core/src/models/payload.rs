//! Field-sparse upstream payloads.
//!
//! The upstream API changes shape per endpoint and over time, so responses
//! are kept as loose JSON maps at the boundary. Accessors never fail on a
//! type mismatch; they return `None` (or an empty slice) instead.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Payload
// ============================================================================

/// A field-sparse mapping from string keys to JSON values.
///
/// One `Payload` represents one source's knowledge of an entity. Keys are
/// kept in sorted order so serializing the same payload always yields the
/// same bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps a JSON value. Only objects are accepted.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Wraps a JSON value, turning anything that is not an object into an
    /// empty payload.
    pub fn from_value_lossy(value: Value) -> Self {
        Self::from_value(value).unwrap_or_default()
    }

    /// Converts the payload back into a JSON object value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Borrows the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Returns true if the payload has no fields at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the raw value for a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Inserts a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a key.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns true if the key holds a non-empty value.
    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !is_empty_value(v))
    }

    /// Returns a non-blank string field.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(as_str)
    }

    /// Returns an integer field, accepting numeric strings and whole floats.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(as_i64)
    }

    /// Returns a boolean field.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Returns an array field, or an empty slice on absence or mismatch.
    pub fn get_array(&self, key: &str) -> &[Value] {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }

    /// Follows a path of object keys.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(*first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        Some(current)
    }

    /// Fills fields that are absent or empty here from `other`.
    ///
    /// A non-empty field is never replaced, and an empty field of `other`
    /// never replaces anything. Returns the keys that were filled, in key
    /// order.
    pub fn merge_missing(&mut self, other: &Payload) -> Vec<String> {
        let mut filled = Vec::new();
        for (key, value) in &other.0 {
            if is_empty_value(value) {
                continue;
            }
            let missing = self.0.get(key).is_none_or(is_empty_value);
            if missing {
                self.0.insert(key.clone(), value.clone());
                filled.push(key.clone());
            }
        }
        filled
    }

    /// Iterates over fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ============================================================================
// Value Helpers
// ============================================================================

/// Returns true for `null`, blank strings, empty arrays and empty objects.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Reads a non-blank string.
pub fn as_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// Reads an integer from a number, a whole float, or a numeric string.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads an identifier that may be encoded as a string or a number.
pub fn as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
