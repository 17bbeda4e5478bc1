//! Secondary index support for TowerDB
//!
//! This module provides ordered secondary indexing with:
//! - A skip-list index built from multi-level towers (the default)
//! - A B-tree index over the same contract
//! - The pluggable [`Index`] trait the record table depends on

pub mod btree;
pub mod key;
pub mod skiplist;

pub use btree::BTreeIndex;
pub use key::{IndexKey, IndexKeyError, OrderedFloat};
pub use skiplist::{SkipIndex, SkipList};

/// The contract every secondary index implements.
///
/// An index maps a totally-ordered key to the positions of the records that
/// carry it. A key maps to one or more positions (duplicates allowed,
/// insertion order preserved); a key with no remaining positions is removed
/// from the index rather than kept empty. Lookups and deletes of absent keys
/// are silent: `None` results and no-ops, never errors.
pub trait Index {
    /// Associate `position` with `key`, appending to any existing positions.
    fn insert(&mut self, key: IndexKey, position: usize);

    /// All positions recorded for `key` in insertion order, or `None` if the
    /// key is absent. A returned list is never empty.
    fn lookup(&self, key: &IndexKey) -> Option<Vec<usize>>;

    /// All positions for keys within the given bounds (both inclusive,
    /// either may be open), ascending by key with insertion order preserved
    /// within a key.
    fn scan(&self, min: Option<&IndexKey>, max: Option<&IndexKey>) -> Vec<usize>;

    /// Remove `position` from `key`'s list, dropping the key once its list
    /// is empty. With `position` of `None` the whole key is removed.
    fn delete(&mut self, key: &IndexKey, position: Option<usize>);
}
