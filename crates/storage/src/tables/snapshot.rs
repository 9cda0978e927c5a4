//! Snapshot table, keyed by (stream, event id)

use super::{in_stream_prefix, stream_prefix_start};
use crate::index::SecondaryIndex;
use bitempo_core::{AggregateId, PersistenceEvent};
use std::collections::BTreeMap;

/// Snapshot rows with their stream index
#[derive(Debug, Clone, Default)]
pub struct SnapshotTable {
    rows: BTreeMap<(AggregateId, String), PersistenceEvent>,
    by_stream: SecondaryIndex<AggregateId, String>,
}

impl SnapshotTable {
    /// Insert or overwrite a snapshot
    pub fn upsert(&mut self, snapshot: PersistenceEvent) {
        let stream = snapshot.stream();
        self.by_stream.insert(stream.clone(), snapshot.id.clone());
        self.rows.insert((stream, snapshot.id.clone()), snapshot);
    }

    /// Remove one snapshot
    pub fn delete(&mut self, stream: &AggregateId, event_id: &str) -> Option<PersistenceEvent> {
        let removed = self.rows.remove(&(stream.clone(), event_id.to_string()));
        if removed.is_some() {
            self.by_stream.remove(stream, &event_id.to_string());
        }
        removed
    }

    /// Snapshot by key
    pub fn get(&self, stream: &AggregateId, event_id: &str) -> Option<&PersistenceEvent> {
        self.rows.get(&(stream.clone(), event_id.to_string()))
    }

    /// All snapshots of one stream
    pub fn for_stream(&self, stream: &AggregateId) -> Vec<&PersistenceEvent> {
        self.by_stream
            .get(stream)
            .filter_map(|id| self.rows.get(&(stream.clone(), id.clone())))
            .collect()
    }

    /// Streams holding at least one snapshot under the prefix
    pub fn streams<'a>(
        &'a self,
        tenant_id: &'a str,
        aggregate_type: Option<&'a str>,
    ) -> impl Iterator<Item = &'a AggregateId> + 'a {
        self.by_stream
            .keys_in(stream_prefix_start(tenant_id, aggregate_type)..)
            .take_while(move |id| in_stream_prefix(id, tenant_id, aggregate_type))
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
