//! Projection-queue table, keyed by (event id, tenant, projection id)

use crate::index::SecondaryIndex;
use bitempo_core::{BitempoError, BitempoResult, ProjectionId, QueueEntry, QueueKey};
use std::collections::BTreeMap;

const TABLE: &str = "projection_queue";

/// Undelivered queue entries with a per-projection index
#[derive(Debug, Clone, Default)]
pub struct ProjectionQueueTable {
    rows: BTreeMap<QueueKey, QueueEntry>,
    by_projection: SecondaryIndex<ProjectionId, QueueKey>,
}

impl ProjectionQueueTable {
    /// Queue an entry
    ///
    /// Queuing the same event of a stream twice for one projection keeps a
    /// single entry. An entry whose key is held by an event of another stream
    /// is a unique violation.
    pub fn insert(&mut self, entry: QueueEntry) -> BitempoResult<()> {
        let key = entry.key();
        if let Some(existing) = self.rows.get(&key) {
            if existing.event.stream() != entry.event.stream() {
                return Err(BitempoError::UniqueViolation {
                    table: TABLE,
                    key: format!("{}/{}", entry.projection, entry.event.id),
                });
            }
        }
        self.by_projection
            .insert(entry.projection.clone(), key.clone());
        self.rows.insert(key, entry);
        Ok(())
    }

    /// Entry by key
    pub fn get(&self, key: &QueueKey) -> Option<&QueueEntry> {
        self.rows.get(key)
    }

    /// True if the entry exists
    pub fn contains(&self, key: &QueueKey) -> bool {
        self.rows.contains_key(key)
    }

    /// Remove one entry
    pub fn delete(&mut self, key: &QueueKey) -> Option<QueueEntry> {
        let removed = self.rows.remove(key);
        if removed.is_some() {
            self.by_projection.remove(&key.projection(), key);
        }
        removed
    }

    /// All entries of one projection
    pub fn for_projection(&self, projection: &ProjectionId) -> Vec<&QueueEntry> {
        self.by_projection
            .get(projection)
            .filter_map(|key| self.rows.get(key))
            .collect()
    }

    /// Remove every entry of one projection, returning how many were removed
    pub fn delete_projection(&mut self, projection: &ProjectionId) -> usize {
        let keys: Vec<QueueKey> = self.by_projection.get(projection).cloned().collect();
        for key in &keys {
            self.rows.remove(key);
            self.by_projection.remove(projection, key);
        }
        keys.len()
    }

    /// Projections with at least one queued entry
    pub fn projections(&self) -> impl Iterator<Item = &ProjectionId> + '_ {
        self.by_projection.keys()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
