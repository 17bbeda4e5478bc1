//! Record table with pluggable secondary indices
//!
//! The table stores records in an append-only backing sequence; a record's
//! position in that sequence is its identity. Any number of named secondary
//! indices can be registered, one per property, and are kept consistent
//! across insert, update, and delete.
//!
//! Deletion is soft: the slot is replaced with a tombstone and the position
//! is never reused or reclaimed. Deletion-heavy workloads therefore grow the
//! backing sequence without bound; a compaction pass is the extension point
//! for reclaiming tombstoned slots and is not provided here.

use crate::index::{Index, IndexKey, IndexKeyError};
use crate::record::{Record, Value};
use std::collections::HashMap;
use std::mem;
use tracing::debug;

/// A slot in the backing sequence: a live record or a tombstone left behind
/// by a deletion.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Live(Record),
    Tombstone,
}

/// Record table with append-only storage and per-property secondary indices
pub struct Table {
    /// Backing sequence; positions index into it and are never reused.
    slots: Vec<Slot>,
    /// Registered indices by property name.
    indices: HashMap<String, Box<dyn Index>>,
    /// Number of tombstoned slots.
    deleted: usize,
}

impl Table {
    /// Create a new empty table
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            indices: HashMap::new(),
            deleted: 0,
        }
    }

    /// Number of live records
    pub fn size(&self) -> usize {
        self.slots.len() - self.deleted
    }

    /// Check if the table holds no live records
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of tombstoned slots
    pub fn deleted_count(&self) -> usize {
        self.deleted
    }

    /// Check if a property has a registered index
    pub fn has_index(&self, property: &str) -> bool {
        self.indices.contains_key(property)
    }

    /// The live record at `position`, if any
    pub fn record(&self, position: usize) -> Option<&Record> {
        match self.slots.get(position) {
            Some(Slot::Live(record)) => Some(record),
            _ => None,
        }
    }

    /// All live records in insertion order
    pub fn all_records(&self) -> Vec<&Record> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Live(record) => Some(record),
                Slot::Tombstone => None,
            })
            .collect()
    }

    /// Append a record, returning its position.
    ///
    /// Every registered index whose property the record carries receives the
    /// (key, position) pair. Index keys are derived before the first
    /// mutation, so a record carrying an unindexable value for an indexed
    /// property is rejected whole.
    pub fn insert(&mut self, record: Record) -> Result<usize, TableError> {
        let position = self.slots.len();

        let mut entries = Vec::new();
        for property in self.indices.keys() {
            if let Some(value) = record.get(property) {
                entries.push((property.clone(), IndexKey::try_from(value)?));
            }
        }

        self.slots.push(Slot::Live(record));
        for (property, key) in entries {
            if let Some(index) = self.indices.get_mut(&property) {
                index.insert(key, position);
            }
        }

        debug!("inserted record at position {}", position);
        Ok(position)
    }

    /// All live records whose `property` equals `value`.
    ///
    /// Uses the property's index when one is registered, otherwise scans
    /// linearly. Records lacking the property are excluded.
    pub fn lookup(&self, property: &str, value: &Value) -> Vec<&Record> {
        self.records_at(&self.resolve(property, value))
    }

    /// All live records whose `property` falls within the inclusive bounds,
    /// either of which may be open.
    ///
    /// With an index registered the result ascends by property value; the
    /// linear fallback keeps insertion order.
    pub fn range(
        &self,
        property: &str,
        min: Option<&Value>,
        max: Option<&Value>,
    ) -> Result<Vec<&Record>, TableError> {
        let lo = min.map(IndexKey::try_from).transpose()?;
        let hi = max.map(IndexKey::try_from).transpose()?;

        if let Some(index) = self.indices.get(property) {
            let positions = index.scan(lo.as_ref(), hi.as_ref());
            return Ok(self.records_at(&positions));
        }

        Ok(self
            .slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Live(record) => record.get(property).map(|value| (record, value)),
                Slot::Tombstone => None,
            })
            .filter(|(_, value)| {
                if lo.is_none() && hi.is_none() {
                    return true;
                }
                match IndexKey::try_from(*value) {
                    Ok(key) => {
                        lo.as_ref().map_or(true, |lo| key >= *lo)
                            && hi.as_ref().map_or(true, |hi| key <= *hi)
                    }
                    Err(_) => false,
                }
            })
            .map(|(record, _)| record)
            .collect())
    }

    /// Apply `patch` to every record whose `property` equals `value`,
    /// returning how many records were touched.
    ///
    /// Only patch properties whose value actually differs are assigned; each
    /// such property with a registered index gets its old key deleted and
    /// the new key inserted for the record's position. Unchanged properties
    /// and properties absent from the patch trigger no index traffic.
    pub fn update(
        &mut self,
        property: &str,
        value: &Value,
        patch: &Record,
    ) -> Result<usize, TableError> {
        // Reject unindexable patch values before touching any state.
        for (field, new_value) in patch.fields() {
            if self.indices.contains_key(field) {
                IndexKey::try_from(new_value)?;
            }
        }

        let positions = self.resolve(property, value);
        let mut updated = 0;
        for &position in &positions {
            let Slot::Live(record) = &mut self.slots[position] else {
                continue;
            };
            for (field, new_value) in patch.fields() {
                if record.get(field) == Some(new_value) {
                    continue;
                }
                let old = record.insert(field.clone(), new_value.clone());
                if let Some(index) = self.indices.get_mut(field) {
                    if let Some(old) = old.as_ref() {
                        index.delete(&IndexKey::try_from(old)?, Some(position));
                    }
                    index.insert(IndexKey::try_from(new_value)?, position);
                }
            }
            updated += 1;
        }
        Ok(updated)
    }

    /// Tombstone every record whose `property` equals `value`, returning how
    /// many records were deleted.
    ///
    /// Each deleted record is withdrawn from the index of every indexed
    /// property it carried.
    pub fn delete(&mut self, property: &str, value: &Value) -> Result<usize, TableError> {
        let positions = self.resolve(property, value);
        let mut removed = 0;
        for &position in &positions {
            let slot = mem::replace(&mut self.slots[position], Slot::Tombstone);
            let Slot::Live(record) = slot else {
                continue;
            };
            for (field, field_value) in record.fields() {
                if let Some(index) = self.indices.get_mut(field) {
                    index.delete(&IndexKey::try_from(field_value)?, Some(position));
                }
            }
            self.deleted += 1;
            removed += 1;
        }

        debug!("deleted {} record(s) where {} matched", removed, property);
        Ok(removed)
    }

    /// Register `index` for `property`, replacing any previous registration.
    ///
    /// The index is backfilled with every live record carrying the property
    /// before it becomes visible to queries; an unindexable value anywhere
    /// in the backfill rejects the registration whole.
    pub fn create_index(
        &mut self,
        property: &str,
        mut index: Box<dyn Index>,
    ) -> Result<(), TableError> {
        let mut entries = Vec::new();
        for (position, slot) in self.slots.iter().enumerate() {
            if let Slot::Live(record) = slot {
                if let Some(value) = record.get(property) {
                    entries.push((IndexKey::try_from(value)?, position));
                }
            }
        }

        debug!(
            "backfilling index on {:?} with {} entries",
            property,
            entries.len()
        );
        for (key, position) in entries {
            index.insert(key, position);
        }
        self.indices.insert(property.to_string(), index);
        Ok(())
    }

    /// Positions of live records whose `property` equals `value`.
    fn resolve(&self, property: &str, value: &Value) -> Vec<usize> {
        if let Some(index) = self.indices.get(property) {
            // An index can never hold a structured value, so a lookup for
            // one resolves to nothing rather than an error.
            return match IndexKey::try_from(value) {
                Ok(key) => index.lookup(&key).unwrap_or_default(),
                Err(_) => Vec::new(),
            };
        }

        self.slots
            .iter()
            .enumerate()
            .filter_map(|(position, slot)| match slot {
                Slot::Live(record) if record.get(property) == Some(value) => Some(position),
                _ => None,
            })
            .collect()
    }

    fn records_at(&self, positions: &[usize]) -> Vec<&Record> {
        positions
            .iter()
            .filter_map(|&position| self.record(position))
            .collect()
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

/// Table errors
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Cannot index value: {0}")]
    Unindexable(#[from] IndexKeyError),
}
