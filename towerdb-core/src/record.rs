//! Record and Value types for TowerDB
//!
//! This module provides the core data structures for record storage:
//! - Record: a flat property-name to value mapping
//! - Value: an enum supporting all JSON types
//!
//! A record carries no identifier of its own; its position in the table's
//! backing sequence is its only stable identity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value type supporting all JSON types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// String value
    String(String),
    /// Array of values
    Array(Vec<Value>),
    /// Object with string keys
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if value is a number (int or float)
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Check if value is a string
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get as array reference
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(arr: Vec<Value>) -> Self {
        Value::Array(arr)
    }
}

/// Record structure with flat properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create a new empty record
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Create a record from fields
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }

    /// Insert a property, returning the previous value if any
    pub fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        self.fields.insert(key, value)
    }

    /// Get a property by name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Remove a property
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Check if a property exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Iterate over all properties in name order
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no properties
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, RecordError> {
        serde_json::to_string(self).map_err(|e| RecordError::Serialization(e.to_string()))
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        serde_json::from_str(json).map_err(|e| RecordError::Deserialization(e.to_string()))
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

/// Record-related errors
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert!(Value::Null.is_null());
        assert!(Value::Int(42).is_number());
        assert!(Value::Float(1.5).is_number());
        assert!(Value::String("test".to_string()).is_string());
    }

    #[test]
    fn test_value_conversions() {
        let v: Value = true.into();
        assert_eq!(v.as_bool(), Some(true));

        let v: Value = 42i64.into();
        assert_eq!(v.as_i64(), Some(42));
        assert_eq!(v.as_f64(), Some(42.0));

        let v: Value = "test".into();
        assert_eq!(v.as_str(), Some("test"));
    }

    #[test]
    fn test_record_basic_operations() {
        let mut record = Record::new();

        record.insert("name".to_string(), "John".into());
        record.insert("age".to_string(), 30.into());

        assert_eq!(record.get("name").and_then(Value::as_str), Some("John"));
        assert_eq!(record.get("age").and_then(Value::as_i64), Some(30));

        assert!(record.contains_key("name"));
        assert!(!record.contains_key("email"));

        assert_eq!(record.insert("age".to_string(), 31.into()), Some(Value::Int(30)));

        record.remove("age");
        assert!(!record.contains_key("age"));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_record_json_roundtrip() {
        let mut record = Record::new();
        record.insert("name".to_string(), "John".into());
        record.insert("age".to_string(), 30.into());

        let json = record.to_json().unwrap();
        assert!(json.contains("name"));
        assert!(json.contains("John"));

        let parsed = Record::from_json(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_record_from_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), Value::Int(1));
        let record = Record::from_fields(fields);
        assert_eq!(record.get("id"), Some(&Value::Int(1)));
    }
}
