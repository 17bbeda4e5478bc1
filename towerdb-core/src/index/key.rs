//! Totally-ordered index keys derived from record values

use crate::record::Value;
use serde::{Deserialize, Serialize};

/// Index key with a total order across all variants
///
/// The derived ordering compares by variant first (null sorts lowest, then
/// booleans, integers, floats, strings) and by payload within a variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexKey {
    /// Null value (lowest sort order)
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value (stored with a total order for comparison)
    Float(OrderedFloat),
    /// String value
    String(String),
}

impl TryFrom<&Value> for IndexKey {
    type Error = IndexKeyError;

    fn try_from(value: &Value) -> Result<Self, IndexKeyError> {
        match value {
            Value::Null => Ok(IndexKey::Null),
            Value::Bool(b) => Ok(IndexKey::Bool(*b)),
            Value::Int(i) => Ok(IndexKey::Int(*i)),
            Value::Float(f) => Ok(IndexKey::Float(OrderedFloat(*f))),
            Value::String(s) => Ok(IndexKey::String(s.clone())),
            Value::Array(_) => Err(IndexKeyError::Unsupported("array")),
            Value::Object(_) => Err(IndexKeyError::Unsupported("object")),
        }
    }
}

impl From<i64> for IndexKey {
    fn from(i: i64) -> Self {
        IndexKey::Int(i)
    }
}

impl From<f64> for IndexKey {
    fn from(f: f64) -> Self {
        IndexKey::Float(OrderedFloat(f))
    }
}

impl From<&str> for IndexKey {
    fn from(s: &str) -> Self {
        IndexKey::String(s.to_string())
    }
}

impl From<bool> for IndexKey {
    fn from(b: bool) -> Self {
        IndexKey::Bool(b)
    }
}

/// Ordered float wrapper for index storage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderedFloat(pub f64);

impl Eq for OrderedFloat {}

impl std::hash::Hash for OrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

/// Index key errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexKeyError {
    #[error("Unsupported value type for ordered indexing: {0}")]
    Unsupported(&'static str),
}
