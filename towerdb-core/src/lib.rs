//! TowerDB Core - In-memory record storage and ordered indexing
//!
//! This crate provides the foundational components for TowerDB:
//! - Skip-list based ordered index built from multi-level towers
//! - Pluggable secondary index contract
//! - Append-only record table with tombstone deletion

pub mod index;
pub mod record;
pub mod table;

pub use index::*;
pub use record::*;
pub use table::*;
