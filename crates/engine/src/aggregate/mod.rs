//! Aggregate store: event streams, their states and snapshots
//!
//! ## Reads
//!
//! - `get`, `get_aggregate_state*`: aggregate-state rows
//! - `load_as_at` / `load_as_of` / `load_as_of_till`: one resolved stream
//! - `load_all_of_aggregate_*` / `load_all_*`: every stream under a prefix
//! - `get_patch_free_periods_for_interval`
//! - `get_aggregates_events`: paginated search over a tenant's events
//!
//! ## Writes
//!
//! `save`, the delete operations and `undo_close_stream` need a write
//! transaction; reads work in either kind.
//!
//! ## Locks
//!
//! `lock` / `unlock` take advisory per-stream locks. They are independent of
//! transactions: a lock taken inside a transaction that aborts stays held.

mod loader;
mod saver;

use std::collections::BTreeMap;

use bitempo_concurrency::{LockTable, TxContext};
use bitempo_core::{
    AggregateId, AggregateState, BitempoError, BitempoResult, PageCursors, PageSpec,
    PersistenceEvent, ResultExt, Spans, Time,
};
use tracing::debug;

pub use loader::TemporalQuery;

use crate::pagination;
use crate::{read_tables, write_tables};

/// Resolved streams keyed by stream id
pub type StreamMap = BTreeMap<AggregateId, Vec<PersistenceEvent>>;

/// Aggregate persistence port over the transaction in a `TxContext`
#[derive(Debug, Default)]
pub struct AggregateStore {
    locks: LockTable<AggregateId>,
}

impl AggregateStore {
    /// Store with no locks held
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Locks
    // ========================================================================

    /// Lock every stream in `ids`, or none of them
    pub fn lock(&self, ids: &[AggregateId]) -> BitempoResult<()> {
        self.locks
            .lock(ids)
            .map_err(|id| BitempoError::AggregateLocked { id })
    }

    /// Release the locks on `ids`; unheld ids are ignored
    pub fn unlock(&self, ids: &[AggregateId]) -> BitempoResult<()> {
        self.locks.unlock(ids);
        Ok(())
    }

    /// True if `id` is locked
    pub fn is_locked(&self, id: &AggregateId) -> bool {
        self.locks.is_locked(id)
    }

    // ========================================================================
    // State reads
    // ========================================================================

    /// States of `ids`, plus the ids that have none
    pub fn get(
        &self,
        ctx: &TxContext,
        ids: &[AggregateId],
    ) -> BitempoResult<(Vec<AggregateState>, Vec<AggregateId>)> {
        let tables = read_tables(ctx)?;
        let mut found = Vec::new();
        let mut not_found = Vec::new();
        for id in ids {
            match tables.aggregate_states.get(id) {
                Some(state) => found.push(state.clone()),
                None => not_found.push(id.clone()),
            }
        }
        Ok((found, not_found))
    }

    /// State of one stream
    pub fn get_aggregate_state(
        &self,
        ctx: &TxContext,
        id: &AggregateId,
    ) -> BitempoResult<AggregateState> {
        read_tables(ctx)?
            .aggregate_states
            .get(id)
            .cloned()
            .ok_or_else(|| BitempoError::AggregateNotFound { id: id.clone() })
    }

    /// States of every stream of one aggregate type, sorted by key
    pub fn get_aggregate_states_for_aggregate_type(
        &self,
        ctx: &TxContext,
        tenant_id: &str,
        aggregate_type: &str,
    ) -> BitempoResult<Vec<AggregateState>> {
        let mut states: Vec<AggregateState> = read_tables(ctx)?
            .aggregate_states
            .for_type(tenant_id, aggregate_type)
            .into_iter()
            .cloned()
            .collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(states)
    }

    /// States of every stream of one tenant, sorted by key
    pub fn get_aggregate_states_for_tenant(
        &self,
        ctx: &TxContext,
        tenant_id: &str,
    ) -> BitempoResult<Vec<AggregateState>> {
        let mut states: Vec<AggregateState> = read_tables(ctx)?
            .aggregate_states
            .for_tenant(tenant_id)
            .into_iter()
            .cloned()
            .collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(states)
    }

    // ========================================================================
    // Stream loads
    // ========================================================================

    /// Resolve one stream under an arbitrary temporal query
    pub fn load(
        &self,
        ctx: &TxContext,
        id: &AggregateId,
        query: TemporalQuery,
    ) -> BitempoResult<Vec<PersistenceEvent>> {
        let events = loader::load_stream(read_tables(ctx)?, id, query)?;
        debug!(target: "bitempo::load", stream = %id, ?query, count = events.len(), "stream loaded");
        Ok(events)
    }

    /// Events recorded by `at` about facts holding by `at`
    pub fn load_as_at(
        &self,
        ctx: &TxContext,
        id: &AggregateId,
        at: Time,
    ) -> BitempoResult<Vec<PersistenceEvent>> {
        self.load(ctx, id, TemporalQuery::AsAt(at))
    }

    /// Events holding by `of`, regardless of when they were recorded
    pub fn load_as_of(
        &self,
        ctx: &TxContext,
        id: &AggregateId,
        of: Time,
    ) -> BitempoResult<Vec<PersistenceEvent>> {
        self.load(ctx, id, TemporalQuery::AsOf(of))
    }

    /// Events holding by `of` as known at `till`
    pub fn load_as_of_till(
        &self,
        ctx: &TxContext,
        id: &AggregateId,
        of: Time,
        till: Time,
    ) -> BitempoResult<Vec<PersistenceEvent>> {
        self.load(
            ctx,
            id,
            TemporalQuery::AsOfTill {
                valid: of,
                recorded: till,
            },
        )
    }

    /// Resolve every stream under a tenant, optionally narrowed to one type
    pub fn load_all(
        &self,
        ctx: &TxContext,
        tenant_id: &str,
        aggregate_type: Option<&str>,
        query: TemporalQuery,
    ) -> BitempoResult<StreamMap> {
        let streams = loader::load_streams(read_tables(ctx)?, tenant_id, aggregate_type, query)?;
        debug!(
            target: "bitempo::load",
            tenant_id,
            aggregate_type,
            ?query,
            streams = streams.len(),
            "streams loaded"
        );
        Ok(streams)
    }

    /// `load_as_at` for every stream of one aggregate type
    pub fn load_all_of_aggregate_as_at(
        &self,
        ctx: &TxContext,
        tenant_id: &str,
        aggregate_type: &str,
        at: Time,
    ) -> BitempoResult<StreamMap> {
        self.load_all(ctx, tenant_id, Some(aggregate_type), TemporalQuery::AsAt(at))
    }

    /// `load_as_of` for every stream of one aggregate type
    pub fn load_all_of_aggregate_as_of(
        &self,
        ctx: &TxContext,
        tenant_id: &str,
        aggregate_type: &str,
        of: Time,
    ) -> BitempoResult<StreamMap> {
        self.load_all(ctx, tenant_id, Some(aggregate_type), TemporalQuery::AsOf(of))
    }

    /// `load_as_of_till` for every stream of one aggregate type
    pub fn load_all_of_aggregate_as_of_till(
        &self,
        ctx: &TxContext,
        tenant_id: &str,
        aggregate_type: &str,
        of: Time,
        till: Time,
    ) -> BitempoResult<StreamMap> {
        self.load_all(
            ctx,
            tenant_id,
            Some(aggregate_type),
            TemporalQuery::AsOfTill {
                valid: of,
                recorded: till,
            },
        )
    }

    /// `load_as_at` for every stream of one tenant
    pub fn load_all_as_at(
        &self,
        ctx: &TxContext,
        tenant_id: &str,
        at: Time,
    ) -> BitempoResult<StreamMap> {
        self.load_all(ctx, tenant_id, None, TemporalQuery::AsAt(at))
    }

    /// `load_as_of` for every stream of one tenant
    pub fn load_all_as_of(
        &self,
        ctx: &TxContext,
        tenant_id: &str,
        of: Time,
    ) -> BitempoResult<StreamMap> {
        self.load_all(ctx, tenant_id, None, TemporalQuery::AsOf(of))
    }

    /// `load_as_of_till` for every stream of one tenant
    pub fn load_all_as_of_till(
        &self,
        ctx: &TxContext,
        tenant_id: &str,
        of: Time,
        till: Time,
    ) -> BitempoResult<StreamMap> {
        self.load_all(
            ctx,
            tenant_id,
            None,
            TemporalQuery::AsOfTill {
                valid: of,
                recorded: till,
            },
        )
    }

    /// Sub-periods of `[start, end]` untouched by any patch of the stream
    pub fn get_patch_free_periods_for_interval(
        &self,
        ctx: &TxContext,
        id: &AggregateId,
        start: Time,
        end: Time,
    ) -> BitempoResult<Spans<Time>> {
        loader::patch_free_periods(read_tables(ctx)?, id, start, end)
    }

    /// One page of a tenant's events, tombstones excluded
    pub fn get_aggregates_events(
        &self,
        ctx: &TxContext,
        tenant_id: &str,
        page: &PageSpec,
    ) -> BitempoResult<(Vec<PersistenceEvent>, PageCursors)> {
        let events: Vec<PersistenceEvent> = read_tables(ctx)?
            .events
            .for_tenant(tenant_id)
            .into_iter()
            .map(|(_, e)| e)
            .filter(|e| !e.is_tombstone())
            .cloned()
            .collect();
        pagination::paginate(events, page).with_context(|| format!("search events of {}", tenant_id))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Upsert `states`, append `events`, insert `snapshots`; stops at the first error
    ///
    /// A snapshot whose valid time falls inside a historical or future patch of
    /// its stream fails with `SnapshotRejected`.
    pub fn save(
        &self,
        ctx: &mut TxContext,
        states: Vec<AggregateState>,
        events: Vec<PersistenceEvent>,
        snapshots: Vec<PersistenceEvent>,
    ) -> BitempoResult<()> {
        let (n_states, n_events, n_snapshots) = (states.len(), events.len(), snapshots.len());
        saver::save(write_tables(ctx)?, states, events, snapshots)?;
        debug!(
            target: "bitempo::save",
            states = n_states,
            events = n_events,
            snapshots = n_snapshots,
            "saved"
        );
        Ok(())
    }

    /// Remove one event
    pub fn hard_delete_event(
        &self,
        ctx: &mut TxContext,
        id: &AggregateId,
        event_id: &str,
    ) -> BitempoResult<()> {
        saver::hard_delete_event(write_tables(ctx)?, id, event_id)
            .with_context(|| format!("hard delete event {}/{}", id, event_id))?;
        debug!(target: "bitempo::save", stream = %id, event_id, "event hard-deleted");
        Ok(())
    }

    /// Overwrite the stored copy of `event` in place
    pub fn soft_delete_event(
        &self,
        ctx: &mut TxContext,
        event: PersistenceEvent,
    ) -> BitempoResult<()> {
        let label = format!("{}/{}", event.stream(), event.id);
        saver::soft_delete_event(write_tables(ctx)?, event)
            .with_context(|| format!("soft delete event {}", label))?;
        debug!(target: "bitempo::save", event = %label, "event soft-deleted");
        Ok(())
    }

    /// Reopen a closed stream, removing its `Delete` events
    pub fn undo_close_stream(&self, ctx: &mut TxContext, id: &AggregateId) -> BitempoResult<()> {
        let removed = saver::undo_close_stream(write_tables(ctx)?, id)?;
        debug!(target: "bitempo::save", stream = %id, removed, "stream reopened");
        Ok(())
    }

    /// Remove snapshots with `valid_time >= since`, except the version-1 snapshot
    pub fn delete_snapshot(
        &self,
        ctx: &mut TxContext,
        id: &AggregateId,
        since: Time,
    ) -> BitempoResult<()> {
        let removed = saver::delete_snapshot(write_tables(ctx)?, id, since);
        debug!(target: "bitempo::save", stream = %id, removed, "snapshots deleted");
        Ok(())
    }

    /// Remove every snapshot lying after the valid time of one of `patches`
    pub fn delete_all_invalid_snapshots(
        &self,
        ctx: &mut TxContext,
        patches: &[PersistenceEvent],
    ) -> BitempoResult<()> {
        let removed = saver::delete_all_invalid_snapshots(write_tables(ctx)?, patches);
        debug!(target: "bitempo::save", patches = patches.len(), removed, "invalid snapshots deleted");
        Ok(())
    }
}
