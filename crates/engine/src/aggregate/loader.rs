//! Bitemporal stream resolution
//!
//! A load picks the latest admissible snapshot of each stream, then appends
//! the raw events recorded after it:
//!
//! 1. keep the snapshots satisfying the query's predicate, take the latest by
//!    `(valid_time, version)` as the seed and cutoff
//! 2. keep the raw events satisfying the predicate and strictly after the cutoff
//! 3. stable-sort by `(valid_time, version)`
//! 4. drop tombstones (`DeletePatch`)

use std::collections::BTreeMap;

use bitempo_core::{
    AggregateId, BitempoError, BitempoResult, EventClass, PersistenceEvent, Span, Spans, Time,
};
use bitempo_storage::Tables;

/// Temporal semantics of a load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalQuery {
    /// What was recorded by `P` about facts holding by `P`
    AsAt(Time),
    /// Every fact holding by `P`, however late it was recorded
    AsOf(Time),
    /// What we believed at `recorded` about facts holding by `valid`
    AsOfTill {
        /// Valid-time horizon
        valid: Time,
        /// Transaction-time horizon
        recorded: Time,
    },
}

impl TemporalQuery {
    /// True if `event` is visible under this query
    pub fn admits(&self, event: &PersistenceEvent) -> bool {
        match *self {
            TemporalQuery::AsAt(p) => event.transaction_time <= p && event.valid_time <= p,
            TemporalQuery::AsOf(p) => event.valid_time <= p,
            TemporalQuery::AsOfTill { valid, recorded } => {
                event.valid_time <= valid && event.transaction_time <= recorded
            }
        }
    }
}

/// Resolve one stream
pub(crate) fn load_stream(
    tables: &Tables,
    id: &AggregateId,
    query: TemporalQuery,
) -> BitempoResult<Vec<PersistenceEvent>> {
    let events = tables.events.for_stream(id);
    let snapshots = tables.snapshots.for_stream(id);
    if events.is_empty() && snapshots.is_empty() {
        return Err(BitempoError::empty_stream(id.to_string()));
    }

    let seed = snapshots
        .into_iter()
        .filter(|s| query.admits(s))
        .max_by_key(|s| s.replay_key());
    let cutoff = seed.map(|s| s.replay_key());

    let mut trailing: Vec<PersistenceEvent> = events
        .into_iter()
        .map(|(_, e)| e)
        .filter(|e| query.admits(e) && cutoff.map_or(true, |c| e.replay_key() > c))
        .cloned()
        .collect();
    trailing.sort_by_key(PersistenceEvent::replay_key);

    let mut stream: Vec<PersistenceEvent> = seed.cloned().into_iter().collect();
    stream.extend(trailing);
    stream.retain(|e| !e.is_tombstone());
    Ok(stream)
}

/// Resolve every stream under a tenant, optionally narrowed to one aggregate type
///
/// Streams whose resolution is empty are left out.
pub(crate) fn load_streams(
    tables: &Tables,
    tenant_id: &str,
    aggregate_type: Option<&str>,
    query: TemporalQuery,
) -> BitempoResult<BTreeMap<AggregateId, Vec<PersistenceEvent>>> {
    let streams = tables.streams(tenant_id, aggregate_type);
    if streams.is_empty() {
        let scope = match aggregate_type {
            Some(t) => format!("{}/{}", tenant_id, t),
            None => tenant_id.to_string(),
        };
        return Err(BitempoError::empty_stream(scope));
    }

    let mut out = BTreeMap::new();
    for id in streams {
        let events = load_stream(tables, &id, query)?;
        if !events.is_empty() {
            out.insert(id, events);
        }
    }
    Ok(out)
}

/// Sub-periods of `[start, end]` not covered by any patch of the stream
///
/// Each historical or future patch covers the closed span between its two
/// timestamps, whichever comes first.
pub(crate) fn patch_free_periods(
    tables: &Tables,
    id: &AggregateId,
    start: Time,
    end: Time,
) -> BitempoResult<Spans<Time>> {
    if start > end {
        return Err(BitempoError::invalid_input(format!(
            "search window starts at {} after its end {}",
            start, end
        )));
    }
    let patched = Spans::from_spans(
        [EventClass::HistoricalPatch, EventClass::FuturePatch]
            .into_iter()
            .flat_map(|class| tables.events.for_stream_class(id, class))
            .map(|(_, e)| {
                let (lo, hi) = e.time_bounds();
                Span::closed(lo, hi)
            }),
    );
    Ok(Spans::from_span(Span::closed(start, end)).except(&patched))
}
