//! Queue lifecycle against the projection tables

use std::collections::HashSet;

use bitempo_core::{far_future, BitempoResult, PersistenceEvent, ProjectionId, QueueEntry, QueueKey, Time};
use bitempo_storage::Tables;

/// Take up to `chunk_size` due entries of `id` out of the queue, in delivery order
///
/// Due means `valid_time <= now`. Delivery order is `(valid_time, aggregate_id,
/// version)`. A `chunk_size` of 0 takes every due entry.
pub(crate) fn dequeue_due(
    tables: &mut Tables,
    id: &ProjectionId,
    now: Time,
    chunk_size: usize,
) -> Vec<PersistenceEvent> {
    let mut due: Vec<PersistenceEvent> = tables
        .projection_queue
        .for_projection(id)
        .into_iter()
        .map(|entry| &entry.event)
        .filter(|e| e.valid_time <= now)
        .cloned()
        .collect();
    due.sort_by(|a, b| {
        (a.valid_time, &a.aggregate_id, a.version).cmp(&(b.valid_time, &b.aggregate_id, b.version))
    });
    if chunk_size > 0 {
        due.truncate(chunk_size);
    }
    for event in &due {
        tables
            .projection_queue
            .delete(&QueueKey::new(event.id.clone(), id));
    }
    due
}

/// Empty the queue of `id`, then enqueue the tenant's events of `event_types`
/// with `valid_time` in `[since, far future]`
///
/// Returns the number of entries enqueued.
pub(crate) fn rebuild(
    tables: &mut Tables,
    id: &ProjectionId,
    since: Time,
    event_types: &[String],
) -> BitempoResult<usize> {
    tables.projection_queue.delete_projection(id);
    if event_types.is_empty() {
        return Ok(0);
    }

    let wanted: HashSet<&str> = event_types.iter().map(String::as_str).collect();
    let horizon = far_future();
    let replay: Vec<PersistenceEvent> = tables
        .events
        .for_tenant(&id.tenant_id)
        .into_iter()
        .map(|(_, e)| e)
        .filter(|e| {
            !e.is_tombstone()
                && wanted.contains(e.event_type.as_str())
                && e.valid_time >= since
                && e.valid_time <= horizon
        })
        .cloned()
        .collect();

    let count = replay.len();
    for event in replay {
        tables
            .projection_queue
            .insert(QueueEntry::new(id.clone(), event))?;
    }
    Ok(count)
}

/// Delete every state row and queue of `projection_id`, in every tenant
///
/// Returns `(states removed, queue entries removed)`.
pub(crate) fn remove_everywhere(tables: &mut Tables, projection_id: &str) -> (usize, usize) {
    let states: Vec<ProjectionId> = tables
        .projection_states
        .all()
        .filter(|s| s.id.projection_id == projection_id)
        .map(|s| s.id.clone())
        .collect();
    for id in &states {
        tables.projection_states.delete(id);
    }

    let queues: Vec<ProjectionId> = tables
        .projection_queue
        .projections()
        .filter(|p| p.projection_id == projection_id)
        .cloned()
        .collect();
    let entries: usize = queues
        .iter()
        .map(|p| tables.projection_queue.delete_projection(p))
        .sum();
    (states.len(), entries)
}
