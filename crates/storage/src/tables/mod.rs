//! The five logical tables
//!
//! | Table | Unique key | Secondary indexes |
//! |---|---|---|
//! | aggregate-state | (tenant, type, aggregate id) | (tenant, type); (tenant) |
//! | event | row id | (stream); (stream, class); (stream, event id) unique; (tenant) |
//! | snapshot | (stream, event id) | (stream) |
//! | projection-state | (tenant, projection id) | (tenant) |
//! | projection-queue | (event id, tenant, projection id) | (tenant, projection id) |
//!
//! Every table is `Clone`; a write transaction works on a private clone of
//! [`Tables`] and publishes it on commit.

mod aggregate_state;
mod event;
mod projection_queue;
mod projection_state;
mod snapshot;

pub use aggregate_state::AggregateStateTable;
pub use event::{EventTable, RowId};
pub use projection_queue::ProjectionQueueTable;
pub use projection_state::ProjectionStateTable;
pub use snapshot::SnapshotTable;

use bitempo_core::AggregateId;

/// All tables of one store generation
#[derive(Debug, Clone, Default)]
pub struct Tables {
    /// Per-stream summary rows
    pub aggregate_states: AggregateStateTable,
    /// Raw events
    pub events: EventTable,
    /// Snapshot events
    pub snapshots: SnapshotTable,
    /// Projection state rows
    pub projection_states: ProjectionStateTable,
    /// Undelivered projection work
    pub projection_queue: ProjectionQueueTable,
}

impl Tables {
    /// Create an empty table set
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams that own events or snapshots, optionally narrowed to one aggregate type
    pub fn streams(&self, tenant_id: &str, aggregate_type: Option<&str>) -> Vec<AggregateId> {
        let mut streams: Vec<AggregateId> = self
            .events
            .streams(tenant_id, aggregate_type)
            .chain(self.snapshots.streams(tenant_id, aggregate_type))
            .cloned()
            .collect();
        streams.sort();
        streams.dedup();
        streams
    }
}

/// Lower bound of all stream keys under a tenant (and type)
pub(crate) fn stream_prefix_start(tenant_id: &str, aggregate_type: Option<&str>) -> AggregateId {
    AggregateId::new(tenant_id, aggregate_type.unwrap_or(""), "")
}

/// True if `id` lies under the tenant (and type) prefix
pub(crate) fn in_stream_prefix(
    id: &AggregateId,
    tenant_id: &str,
    aggregate_type: Option<&str>,
) -> bool {
    id.tenant_id == tenant_id && aggregate_type.map_or(true, |t| id.aggregate_type == t)
}
