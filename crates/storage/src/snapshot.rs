//! StoreSnapshot: immutable point-in-time view of all tables
//!
//! A snapshot shares the published `Arc<Tables>` of one store generation.
//! Publishing a newer generation never mutates the tables a snapshot holds,
//! so readers keep a consistent view for as long as they keep the snapshot.

use std::sync::Arc;

use crate::tables::Tables;

/// Immutable view of one store generation
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    /// Generation at which this snapshot was taken
    version: u64,
    /// Shared tables of that generation
    tables: Arc<Tables>,
}

impl StoreSnapshot {
    /// Create a snapshot of `tables` at `version`
    ///
    /// This is typically called by `MemStore::snapshot()`, not directly.
    pub fn new(version: u64, tables: Arc<Tables>) -> Self {
        Self { version, tables }
    }

    /// Generation at which this snapshot was taken
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The tables as of this snapshot
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Deep copy of the tables, used as the working set of a write transaction
    pub fn to_working_copy(&self) -> Tables {
        Tables::clone(&self.tables)
    }
}
