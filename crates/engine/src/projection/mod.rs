//! Projection store: read-model state and per-projection event queues
//!
//! Events reach a projection through its queue. `save_events` enqueues,
//! `get_since_last_run` delivers the due part of the queue in chunks and
//! removes exactly what it delivered within the same transaction, so an
//! aborted run redelivers the chunk. `reset_since` rebuilds a queue from the
//! event table.

mod queue;

use std::sync::Arc;

use bitempo_concurrency::{LockTable, TxContext};
use bitempo_core::{
    AggregateId, BitempoError, BitempoResult, Clock, ProjectionDto, ProjectionId, QueueEntry,
    QueueKey, SystemClock, Time,
};
use tracing::debug;

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::{read_tables, write_tables};

/// Options of one `get_since_last_run` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum entries delivered; 0 means every due entry
    pub chunk_size: usize,
}

impl RunOptions {
    /// Deliver at most `chunk_size` entries
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Deliver every due entry
    pub fn unbounded() -> Self {
        Self { chunk_size: 0 }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Projection persistence port over the transaction in a `TxContext`
pub struct ProjectionStore {
    locks: LockTable<ProjectionId>,
    clock: Arc<dyn Clock>,
}

impl ProjectionStore {
    /// Store driven by the wall clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store whose notion of "now" comes from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            locks: LockTable::new(),
            clock,
        }
    }

    /// Lock every projection in `ids`, or none of them
    pub fn lock(&self, ids: &[ProjectionId]) -> BitempoResult<()> {
        self.locks
            .lock(ids)
            .map_err(|id| BitempoError::ProjectionLocked { id })
    }

    /// Release the locks on `ids`; unheld ids are ignored
    pub fn unlock(&self, ids: &[ProjectionId]) -> BitempoResult<()> {
        self.locks.unlock(ids);
        Ok(())
    }

    /// True if `id` is locked
    pub fn is_locked(&self, id: &ProjectionId) -> bool {
        self.locks.is_locked(id)
    }

    /// State of one projection, without events
    pub fn get(&self, ctx: &TxContext, id: &ProjectionId) -> BitempoResult<ProjectionDto> {
        read_tables(ctx)?
            .projection_states
            .get(id)
            .cloned()
            .map(ProjectionDto::from)
            .ok_or_else(|| BitempoError::ProjectionNotFound { id: id.clone() })
    }

    /// States of every projection of one tenant, sorted by key
    pub fn get_all_for_tenant(
        &self,
        ctx: &TxContext,
        tenant_id: &str,
    ) -> BitempoResult<Vec<ProjectionDto>> {
        let mut dtos: Vec<ProjectionDto> = read_tables(ctx)?
            .projection_states
            .for_tenant(tenant_id)
            .into_iter()
            .cloned()
            .map(ProjectionDto::from)
            .collect();
        dtos.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(dtos)
    }

    /// States of every projection, sorted by key
    pub fn get_all_for_all_tenants(&self, ctx: &TxContext) -> BitempoResult<Vec<ProjectionDto>> {
        Ok(read_tables(ctx)?
            .projection_states
            .all()
            .cloned()
            .map(ProjectionDto::from)
            .collect())
    }

    /// Upsert the state rows of `dtos`; their events are ignored
    pub fn save_states(&self, ctx: &mut TxContext, dtos: &[ProjectionDto]) -> BitempoResult<()> {
        let tables = write_tables(ctx)?;
        for dto in dtos {
            tables.projection_states.upsert(dto.to_state());
        }
        debug!(target: "bitempo::projection", count = dtos.len(), "states saved");
        Ok(())
    }

    /// Enqueue every event of each DTO for that DTO's projection
    pub fn save_events(&self, ctx: &mut TxContext, dtos: &[ProjectionDto]) -> BitempoResult<()> {
        let tables = write_tables(ctx)?;
        let mut count = 0;
        for dto in dtos {
            for event in &dto.events {
                tables
                    .projection_queue
                    .insert(QueueEntry::new(dto.id.clone(), event.clone()))?;
                count += 1;
            }
        }
        debug!(target: "bitempo::projection", count, "events enqueued");
        Ok(())
    }

    /// State of `id` plus the next chunk of its due queue entries
    ///
    /// The delivered entries leave the queue in the calling transaction.
    pub fn get_since_last_run(
        &self,
        ctx: &mut TxContext,
        id: &ProjectionId,
        options: RunOptions,
    ) -> BitempoResult<ProjectionDto> {
        let dto = self.get(ctx, id)?;
        let now = self.clock.now();
        let events = queue::dequeue_due(write_tables(ctx)?, id, now, options.chunk_size);
        debug!(
            target: "bitempo::projection",
            projection = %id,
            delivered = events.len(),
            chunk_size = options.chunk_size,
            "queue chunk delivered"
        );
        Ok(dto.with_events(events))
    }

    /// Rebuild the queue of `id` from the tenant's events since `since`
    ///
    /// Only events whose type is in `event_types` are enqueued; an empty list
    /// leaves the queue empty.
    pub fn reset_since(
        &self,
        ctx: &mut TxContext,
        id: &ProjectionId,
        since: Time,
        event_types: &[String],
    ) -> BitempoResult<()> {
        let enqueued = queue::rebuild(write_tables(ctx)?, id, since, event_types)?;
        debug!(
            target: "bitempo::projection",
            projection = %id,
            %since,
            enqueued,
            "queue reset"
        );
        Ok(())
    }

    /// Remove the state rows and queues of `projection_id` in every tenant
    pub fn remove_projection(&self, ctx: &mut TxContext, projection_id: &str) -> BitempoResult<()> {
        let (states, entries) = queue::remove_everywhere(write_tables(ctx)?, projection_id);
        debug!(
            target: "bitempo::projection",
            projection_id,
            states,
            entries,
            "projection removed"
        );
        Ok(())
    }

    /// Drop one event from the queue of `id`
    pub fn delete_event_from_queue(
        &self,
        ctx: &mut TxContext,
        id: &ProjectionId,
        event_id: &str,
    ) -> BitempoResult<()> {
        write_tables(ctx)?
            .projection_queue
            .delete(&QueueKey::new(event_id, id));
        Ok(())
    }

    /// True if `event_id` still waits in the queue of `id`
    pub fn is_event_still_in_queue(
        &self,
        ctx: &TxContext,
        id: &ProjectionId,
        event_id: &str,
    ) -> BitempoResult<bool> {
        Ok(read_tables(ctx)?
            .projection_queue
            .contains(&QueueKey::new(event_id, id)))
    }

    /// Projections of the aggregate's tenant still holding `event_id` of that aggregate
    pub fn get_projections_with_event_in_queue(
        &self,
        ctx: &TxContext,
        aggregate: &AggregateId,
        event_id: &str,
    ) -> BitempoResult<Vec<ProjectionId>> {
        let tables = read_tables(ctx)?;
        Ok(tables
            .projection_queue
            .projections()
            .filter(|p| p.tenant_id == aggregate.tenant_id)
            .filter(|p| {
                tables
                    .projection_queue
                    .get(&QueueKey::new(event_id, p))
                    .map_or(false, |entry| {
                        entry.event.aggregate_type == aggregate.aggregate_type
                            && entry.event.aggregate_id == aggregate.aggregate_id
                    })
            })
            .cloned()
            .collect())
    }
}

impl Default for ProjectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProjectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionStore")
            .field("locks_held", &self.locks.len())
            .finish()
    }
}
