//! Writes against the aggregate tables
//!
//! Every function here mutates the working copy of one write transaction and
//! leaves atomicity to its commit or abort.

use bitempo_core::{
    AggregateId, AggregateState, BitempoError, BitempoResult, EventClass, PersistenceEvent,
    ResultExt, Span, Time,
};
use bitempo_storage::Tables;

/// Upsert states, append events, then insert snapshots, stopping at the first error
pub(crate) fn save(
    tables: &mut Tables,
    states: Vec<AggregateState>,
    events: Vec<PersistenceEvent>,
    snapshots: Vec<PersistenceEvent>,
) -> BitempoResult<()> {
    for state in states {
        tables.aggregate_states.upsert(state);
    }
    for event in events {
        let label = format!("{}/{}", event.stream(), event.id);
        tables
            .events
            .insert(event)
            .with_context(|| format!("append event {}", label))?;
    }
    for snapshot in snapshots {
        check_admissible(tables, &snapshot)?;
        tables.snapshots.upsert(snapshot);
    }
    Ok(())
}

/// Reject a snapshot whose valid time lies inside a patch interval of its stream
///
/// Historical patches cover `[min, max)`, future patches `[min, max]`.
pub(crate) fn check_admissible(tables: &Tables, snapshot: &PersistenceEvent) -> BitempoResult<()> {
    let stream = snapshot.stream();
    for class in [EventClass::HistoricalPatch, EventClass::FuturePatch] {
        for (_, patch) in tables.events.for_stream_class(&stream, class) {
            if patch_interval(patch).contains(snapshot.valid_time) {
                return Err(BitempoError::SnapshotRejected {
                    id: stream,
                    valid_time: snapshot.valid_time,
                    patch_event_id: patch.id.clone(),
                });
            }
        }
    }
    Ok(())
}

fn patch_interval(patch: &PersistenceEvent) -> Span<Time> {
    let (lo, hi) = patch.time_bounds();
    match patch.class {
        EventClass::FuturePatch => Span::closed(lo, hi),
        _ => Span::closed_open(lo, hi),
    }
}

/// Remove one event row
pub(crate) fn hard_delete_event(
    tables: &mut Tables,
    id: &AggregateId,
    event_id: &str,
) -> BitempoResult<PersistenceEvent> {
    let row_id = tables
        .events
        .find(id, event_id)
        .map(|(row_id, _)| row_id)
        .ok_or_else(|| {
            BitempoError::invalid_input(format!("event {}/{} does not exist", id, event_id))
        })?;
    tables.events.delete(row_id, id, event_id)
}

/// Overwrite the stored row carrying `event.id`, keeping its row id
pub(crate) fn soft_delete_event(tables: &mut Tables, event: PersistenceEvent) -> BitempoResult<()> {
    let stream = event.stream();
    let row_id = tables
        .events
        .find(&stream, &event.id)
        .map(|(row_id, _)| row_id)
        .ok_or_else(|| {
            BitempoError::invalid_input(format!("event {}/{} does not exist", stream, event.id))
        })?;
    tables.events.replace(row_id, event)
}

/// Reopen a closed stream
///
/// Clears `close_time`, removes the stream's `Delete` events and recomputes
/// the version and time fields of the state
/// from the remaining events. Returns the number of events removed.
pub(crate) fn undo_close_stream(tables: &mut Tables, id: &AggregateId) -> BitempoResult<usize> {
    let mut state = tables
        .aggregate_states
        .get(id)
        .cloned()
        .ok_or_else(|| BitempoError::AggregateNotFound { id: id.clone() })?;

    let closing: Vec<(u64, String)> = tables
        .events
        .for_stream_class(id, EventClass::Delete)
        .into_iter()
        .map(|(row_id, e)| (row_id, e.id.clone()))
        .collect();
    for (row_id, event_id) in &closing {
        tables.events.delete(*row_id, id, event_id)?;
    }

    let remaining = tables.events.for_stream(id);
    if let Some(version) = remaining.iter().map(|(_, e)| e.version).max() {
        state.current_version = version;
    }
    if let Some(tt) = remaining.iter().map(|(_, e)| e.transaction_time).max() {
        state.last_transaction_time = tt;
    }
    if let Some(vt) = remaining.iter().map(|(_, e)| e.valid_time).max() {
        state.latest_valid_time = vt;
    }
    state.close_time = None;
    tables.aggregate_states.upsert(state);
    Ok(closing.len())
}

/// Remove snapshots with `valid_time >= since`, sparing the version-1 snapshot
pub(crate) fn delete_snapshot(tables: &mut Tables, id: &AggregateId, since: Time) -> usize {
    delete_snapshots_where(tables, id, |s| s.valid_time >= since && s.version != 1)
}

/// Remove every snapshot materialized past one of `patches`
pub(crate) fn delete_all_invalid_snapshots(
    tables: &mut Tables,
    patches: &[PersistenceEvent],
) -> usize {
    patches
        .iter()
        .map(|patch| {
            let patch_time = patch.valid_time;
            delete_snapshots_where(tables, &patch.stream(), |s| s.valid_time > patch_time)
        })
        .sum()
}

fn delete_snapshots_where<F>(tables: &mut Tables, id: &AggregateId, doomed: F) -> usize
where
    F: Fn(&PersistenceEvent) -> bool,
{
    let ids: Vec<String> = tables
        .snapshots
        .for_stream(id)
        .into_iter()
        .filter(|s| doomed(s))
        .map(|s| s.id.clone())
        .collect();
    for event_id in &ids {
        tables.snapshots.delete(id, event_id);
    }
    ids.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> Time {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn stream() -> AggregateId {
        AggregateId::new("t", "contract", "1")
    }

    fn event(version: u64, class: EventClass, tt: i64, vt: i64) -> PersistenceEvent {
        PersistenceEvent::new(
            &stream(),
            version,
            "changed",
            class,
            at(tt),
            at(vt),
            serde_json::Value::Null,
        )
    }

    #[test]
    fn test_historical_patch_interval_is_half_open() {
        let mut tables = Tables::new();
        tables
            .events
            .insert(event(2, EventClass::HistoricalPatch, 30, 20))
            .unwrap();

        assert!(check_admissible(&tables, &event(1, EventClass::Patch, 40, 20)).is_err());
        assert!(check_admissible(&tables, &event(1, EventClass::Patch, 40, 25)).is_err());
        assert!(check_admissible(&tables, &event(1, EventClass::Patch, 40, 30)).is_ok());
        assert!(check_admissible(&tables, &event(1, EventClass::Patch, 40, 19)).is_ok());
    }

    #[test]
    fn test_future_patch_interval_is_closed() {
        let mut tables = Tables::new();
        tables
            .events
            .insert(event(2, EventClass::FuturePatch, 20, 30))
            .unwrap();

        assert!(check_admissible(&tables, &event(1, EventClass::Patch, 40, 30)).is_err());
        assert!(check_admissible(&tables, &event(1, EventClass::Patch, 40, 20)).is_err());
        assert!(check_admissible(&tables, &event(1, EventClass::Patch, 40, 31)).is_ok());
    }

    #[test]
    fn test_delete_snapshot_spares_version_one() {
        let mut tables = Tables::new();
        for v in 1..=3 {
            tables.snapshots.upsert(event(v, EventClass::Patch, v as i64 * 10, v as i64 * 10));
        }
        assert_eq!(delete_snapshot(&mut tables, &stream(), at(0)), 2);
        let left = tables.snapshots.for_stream(&stream());
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].version, 1);
    }
}
