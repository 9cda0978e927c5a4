//! MemStore: in-memory table store with copy-on-write generations
//!
//! This module holds the current generation of [`Tables`] behind a
//! `parking_lot::RwLock<Arc<Tables>>`:
//! - readers clone the `Arc` (O(1)) and read without further locking
//! - a writer deep-copies the tables, mutates the copy privately, then
//!   publishes it as the next generation in one pointer swap
//!
//! # Design Notes
//!
//! - **Single writer**: a working copy publishes only over the generation it
//!   was taken from; a writer that lost the race gets `StaleGeneration`
//! - **Generations**: every publish increments the store version, which
//!   snapshots record

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bitempo_core::{BitempoError, BitempoResult};
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::snapshot::StoreSnapshot;
use crate::tables::Tables;

/// In-memory table store
#[derive(Debug, Default)]
pub struct MemStore {
    /// Published generation
    current: RwLock<Arc<Tables>>,
    /// Generation counter, incremented on every publish
    version: AtomicU64,
}

impl MemStore {
    /// Create a new empty store at version 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Take a snapshot of the current generation
    pub fn snapshot(&self) -> StoreSnapshot {
        // Hold the read lock while reading the version so the pair cannot tear
        // against a concurrent publish.
        let current = self.current.read();
        let version = self.current_version();
        StoreSnapshot::new(version, Arc::clone(&current))
    }

    /// Publish `tables`, taken from generation `base_version`, as the next
    /// generation and return its version
    ///
    /// Fails with `StaleGeneration` if another publish happened since
    /// `base_version`; the store is left unchanged.
    pub fn publish(&self, base_version: u64, tables: Tables) -> BitempoResult<u64> {
        let mut current = self.current.write();
        let current_version = self.current_version();
        if current_version != base_version {
            warn!(
                target: "bitempo::storage",
                base_version,
                current_version,
                "rejected publish over a newer generation"
            );
            return Err(BitempoError::StaleGeneration {
                base_version,
                current_version,
            });
        }
        *current = Arc::new(tables);
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(target: "bitempo::storage", version, "published generation");
        Ok(version)
    }
}
