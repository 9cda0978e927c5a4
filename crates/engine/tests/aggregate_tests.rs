//! Integration tests for the aggregate store
//!
//! Temporal load semantics, snapshot admissibility and invalidation,
//! deletion, stream reopening and state reads, all through `Engine`.

use bitempo_core::{
    AggregateId, AggregateState, BitempoError, EventClass, PersistenceEvent, Span, Time,
};
use bitempo_engine::Engine;
use chrono::{TimeZone, Utc};

fn at(secs: i64) -> Time {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn contract(id: &str) -> AggregateId {
    AggregateId::new("acme", "contract", id)
}

fn event(stream: &AggregateId, version: u64, class: EventClass, tt: i64, vt: i64) -> PersistenceEvent {
    PersistenceEvent::new(
        stream,
        version,
        "changed",
        class,
        at(tt),
        at(vt),
        serde_json::json!({ "version": version }),
    )
    .with_id(format!("{}-e{}", stream.aggregate_id, version))
}

fn state_after(stream: &AggregateId, events: &[PersistenceEvent]) -> AggregateState {
    let mut state = AggregateState::created(stream.clone(), &events[0]);
    for e in &events[1..] {
        state.record(e);
    }
    state
}

/// Save `events` for `stream` together with the matching state row
fn seed(engine: &Engine, stream: &AggregateId, events: Vec<PersistenceEvent>) {
    let state = state_after(stream, &events);
    engine
        .within_tx(|ctx| engine.aggregates().save(ctx, vec![state], events, vec![]))
        .unwrap();
}

fn versions(events: &[PersistenceEvent]) -> Vec<u64> {
    events.iter().map(|e| e.version).collect()
}

// ============================================================================
// Temporal predicates
// ============================================================================

#[test]
fn test_as_at_requires_both_timelines() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(
        &engine,
        &id,
        vec![
            event(&id, 1, EventClass::Create, 1, 1),
            event(&id, 2, EventClass::Patch, 10, 20),
        ],
    );

    let early = engine
        .without_tx(|ctx| engine.aggregates().load_as_at(ctx, &id, at(15)))
        .unwrap();
    assert_eq!(versions(&early), vec![1]);

    let late = engine
        .without_tx(|ctx| engine.aggregates().load_as_at(ctx, &id, at(25)))
        .unwrap();
    assert_eq!(versions(&late), vec![1, 2]);
}

#[test]
fn test_as_of_ignores_transaction_time() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(
        &engine,
        &id,
        vec![
            event(&id, 1, EventClass::Create, 1, 1),
            event(&id, 2, EventClass::HistoricalPatch, 30, 5),
        ],
    );

    let out = engine
        .without_tx(|ctx| engine.aggregates().load_as_of(ctx, &id, at(10)))
        .unwrap();
    assert_eq!(versions(&out), vec![1, 2]);
}

#[test]
fn test_as_of_till_is_a_conjunction() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(
        &engine,
        &id,
        vec![
            event(&id, 1, EventClass::Create, 1, 1),
            event(&id, 2, EventClass::HistoricalPatch, 30, 5),
        ],
    );

    let believed_later = engine
        .without_tx(|ctx| engine.aggregates().load_as_of_till(ctx, &id, at(10), at(40)))
        .unwrap();
    assert_eq!(versions(&believed_later), vec![1, 2]);

    let believed_earlier = engine
        .without_tx(|ctx| engine.aggregates().load_as_of_till(ctx, &id, at(10), at(20)))
        .unwrap();
    assert_eq!(versions(&believed_earlier), vec![1]);
}

#[test]
fn test_load_is_sorted_by_valid_time_then_version() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(
        &engine,
        &id,
        vec![
            event(&id, 1, EventClass::Create, 1, 10),
            event(&id, 2, EventClass::Patch, 2, 30),
            event(&id, 3, EventClass::HistoricalPatch, 3, 5),
            event(&id, 4, EventClass::HistoricalPatch, 4, 10),
        ],
    );

    let out = engine
        .without_tx(|ctx| engine.aggregates().load_as_of(ctx, &id, at(100)))
        .unwrap();
    assert_eq!(versions(&out), vec![3, 1, 4, 2]);
    assert!(out
        .windows(2)
        .all(|w| w[0].replay_key() <= w[1].replay_key()));
}

#[test]
fn test_soft_deleted_event_never_loads() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(
        &engine,
        &id,
        vec![
            event(&id, 1, EventClass::Create, 1, 1),
            event(&id, 2, EventClass::Patch, 2, 2),
        ],
    );

    let mut tombstone = event(&id, 2, EventClass::Patch, 2, 2);
    tombstone.class = EventClass::DeletePatch;
    engine
        .within_tx(|ctx| engine.aggregates().soft_delete_event(ctx, tombstone))
        .unwrap();

    let loads = engine
        .without_tx(|ctx| {
            let aggregates = engine.aggregates();
            Ok(vec![
                aggregates.load_as_at(ctx, &id, at(100))?,
                aggregates.load_as_of(ctx, &id, at(100))?,
                aggregates.load_as_of_till(ctx, &id, at(100), at(100))?,
            ])
        })
        .unwrap();
    for load in loads {
        assert_eq!(versions(&load), vec![1]);
    }
}

#[test]
fn test_unknown_stream_is_empty_event_stream() {
    let engine = Engine::ephemeral();
    let err = engine
        .without_tx(|ctx| engine.aggregates().load_as_of(ctx, &contract("nope"), at(1)))
        .unwrap_err();
    assert!(err.is_empty_stream());
}

#[test]
fn test_stream_with_no_matching_events_is_empty_ok() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(&engine, &id, vec![event(&id, 1, EventClass::Create, 50, 50)]);

    let out = engine
        .without_tx(|ctx| engine.aggregates().load_as_at(ctx, &id, at(10)))
        .unwrap();
    assert!(out.is_empty());
}

// ============================================================================
// Snapshots
// ============================================================================

#[test]
fn test_snapshot_inside_historical_patch_is_rejected() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(
        &engine,
        &id,
        vec![
            event(&id, 1, EventClass::Create, 1, 1),
            event(&id, 2, EventClass::HistoricalPatch, 5, 15),
        ],
    );

    let inside = event(&id, 2, EventClass::Patch, 16, 10).with_id("snap-10");
    let err = engine
        .within_tx(|ctx| engine.aggregates().save(ctx, vec![], vec![], vec![inside]))
        .unwrap_err();
    match err {
        BitempoError::SnapshotRejected { patch_event_id, .. } => {
            assert_eq!(patch_event_id, "1-e2")
        }
        other => panic!("expected SnapshotRejected, got {other:?}"),
    }

    let outside = event(&id, 2, EventClass::Patch, 16, 20).with_id("snap-20");
    engine
        .within_tx(|ctx| engine.aggregates().save(ctx, vec![], vec![], vec![outside]))
        .unwrap();
}

#[test]
fn test_rejected_snapshot_rolls_back_whole_save() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(
        &engine,
        &id,
        vec![
            event(&id, 1, EventClass::Create, 1, 1),
            event(&id, 2, EventClass::HistoricalPatch, 5, 15),
        ],
    );

    let extra = event(&id, 3, EventClass::Patch, 20, 20);
    let bad_snapshot = event(&id, 2, EventClass::Patch, 16, 10).with_id("snap");
    let result = engine.within_tx(|ctx| {
        engine
            .aggregates()
            .save(ctx, vec![], vec![extra], vec![bad_snapshot])
    });
    assert!(result.is_err());

    let out = engine
        .without_tx(|ctx| engine.aggregates().load_as_of(ctx, &id, at(100)))
        .unwrap();
    assert_eq!(versions(&out), vec![1, 2]);
}

#[test]
fn test_load_starts_from_latest_snapshot() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(
        &engine,
        &id,
        vec![
            event(&id, 1, EventClass::Create, 1, 1),
            event(&id, 2, EventClass::Patch, 2, 2),
            event(&id, 3, EventClass::Patch, 3, 3),
        ],
    );
    let snapshot = event(&id, 2, EventClass::Patch, 2, 2).with_id("snap-2");
    engine
        .within_tx(|ctx| engine.aggregates().save(ctx, vec![], vec![], vec![snapshot]))
        .unwrap();

    let out = engine
        .without_tx(|ctx| engine.aggregates().load_as_of(ctx, &id, at(100)))
        .unwrap();
    assert_eq!(out[0].id, "snap-2");
    assert_eq!(versions(&out), vec![2, 3]);

    // Before the snapshot's valid time the raw events are replayed
    let early = engine
        .without_tx(|ctx| engine.aggregates().load_as_of(ctx, &id, at(1)))
        .unwrap();
    assert_eq!(versions(&early), vec![1]);
}

#[test]
fn test_delete_all_invalid_snapshots_purges_after_patch_time() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(
        &engine,
        &id,
        vec![
            event(&id, 1, EventClass::Create, 1, 1),
            event(&id, 2, EventClass::Patch, 20, 20),
            event(&id, 3, EventClass::Patch, 40, 40),
        ],
    );
    let snapshots = vec![
        event(&id, 2, EventClass::Patch, 20, 20).with_id("snap-20"),
        event(&id, 3, EventClass::Patch, 40, 40).with_id("snap-40"),
    ];
    engine
        .within_tx(|ctx| engine.aggregates().save(ctx, vec![], vec![], snapshots))
        .unwrap();

    let patch = event(&id, 4, EventClass::HistoricalPatch, 50, 30);
    engine
        .within_tx(|ctx| {
            engine
                .aggregates()
                .delete_all_invalid_snapshots(ctx, std::slice::from_ref(&patch))
        })
        .unwrap();

    let out = engine
        .without_tx(|ctx| engine.aggregates().load_as_of(ctx, &id, at(100)))
        .unwrap();
    assert_eq!(out[0].id, "snap-20");
}

#[test]
fn test_delete_snapshot_keeps_initial_snapshot() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(
        &engine,
        &id,
        vec![
            event(&id, 1, EventClass::Create, 1, 1),
            event(&id, 2, EventClass::Patch, 2, 2),
        ],
    );
    let snapshots = vec![
        event(&id, 1, EventClass::Create, 1, 1).with_id("snap-1"),
        event(&id, 2, EventClass::Patch, 2, 2).with_id("snap-2"),
    ];
    engine
        .within_tx(|ctx| engine.aggregates().save(ctx, vec![], vec![], snapshots))
        .unwrap();

    engine
        .within_tx(|ctx| engine.aggregates().delete_snapshot(ctx, &id, at(0)))
        .unwrap();

    let out = engine
        .without_tx(|ctx| engine.aggregates().load_as_of(ctx, &id, at(100)))
        .unwrap();
    assert_eq!(out[0].id, "snap-1");
    assert_eq!(versions(&out), vec![1, 2]);
}

// ============================================================================
// Patch-free periods
// ============================================================================

#[test]
fn test_patch_free_periods_split_around_patch() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(
        &engine,
        &id,
        vec![
            event(&id, 1, EventClass::Create, 0, 0),
            event(&id, 2, EventClass::HistoricalPatch, 30, 20),
        ],
    );

    let free = engine
        .without_tx(|ctx| {
            engine
                .aggregates()
                .get_patch_free_periods_for_interval(ctx, &id, at(0), at(100))
        })
        .unwrap();
    assert_eq!(
        free.as_slice(),
        &[
            Span::closed_open(at(0), at(20)),
            Span::open_closed(at(30), at(100)),
        ]
    );
}

#[test]
fn test_patch_free_periods_without_patches_is_whole_window() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(&engine, &id, vec![event(&id, 1, EventClass::Create, 0, 0)]);

    let free = engine
        .without_tx(|ctx| {
            engine
                .aggregates()
                .get_patch_free_periods_for_interval(ctx, &id, at(0), at(100))
        })
        .unwrap();
    assert_eq!(free.as_slice(), &[Span::closed(at(0), at(100))]);
}

// ============================================================================
// Multi-stream loads
// ============================================================================

#[test]
fn test_load_all_of_aggregate_skips_empty_results() {
    let engine = Engine::ephemeral();
    let early = contract("1");
    let late = contract("2");
    let invoice = AggregateId::new("acme", "invoice", "1");
    seed(&engine, &early, vec![event(&early, 1, EventClass::Create, 1, 1)]);
    seed(&engine, &late, vec![event(&late, 1, EventClass::Create, 50, 50)]);
    seed(&engine, &invoice, vec![event(&invoice, 1, EventClass::Create, 1, 1)]);

    let streams = engine
        .without_tx(|ctx| {
            engine
                .aggregates()
                .load_all_of_aggregate_as_at(ctx, "acme", "contract", at(10))
        })
        .unwrap();
    assert_eq!(streams.keys().collect::<Vec<_>>(), vec![&early]);

    let tenant = engine
        .without_tx(|ctx| engine.aggregates().load_all_as_of(ctx, "acme", at(100)))
        .unwrap();
    assert_eq!(tenant.len(), 3);

    let till = engine
        .without_tx(|ctx| engine.aggregates().load_all_as_of_till(ctx, "acme", at(100), at(10)))
        .unwrap();
    assert_eq!(till.len(), 2);
}

#[test]
fn test_load_all_on_empty_tenant_is_empty_event_stream() {
    let engine = Engine::ephemeral();
    let err = engine
        .without_tx(|ctx| engine.aggregates().load_all_as_at(ctx, "ghost", at(1)))
        .unwrap_err();
    assert!(err.is_empty_stream());
}

// ============================================================================
// States, deletes, reopening
// ============================================================================

#[test]
fn test_get_splits_found_and_not_found() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(&engine, &id, vec![event(&id, 1, EventClass::Create, 1, 1)]);

    let (found, missing) = engine
        .without_tx(|ctx| engine.aggregates().get(ctx, &[id.clone(), contract("2")]))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, id);
    assert_eq!(missing, vec![contract("2")]);

    let err = engine
        .without_tx(|ctx| engine.aggregates().get_aggregate_state(ctx, &contract("2")))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_state_reads_by_type_and_tenant() {
    let engine = Engine::ephemeral();
    let b = contract("b");
    let a = contract("a");
    let invoice = AggregateId::new("acme", "invoice", "1");
    for id in [&b, &a, &invoice] {
        seed(&engine, id, vec![event(id, 1, EventClass::Create, 1, 1)]);
    }

    let (by_type, by_tenant, other) = engine
        .without_tx(|ctx| {
            let aggregates = engine.aggregates();
            Ok((
                aggregates.get_aggregate_states_for_aggregate_type(ctx, "acme", "contract")?,
                aggregates.get_aggregate_states_for_tenant(ctx, "acme")?,
                aggregates.get_aggregate_states_for_tenant(ctx, "other")?,
            ))
        })
        .unwrap();
    let type_ids: Vec<&AggregateId> = by_type.iter().map(|s| &s.id).collect();
    assert_eq!(type_ids, vec![&a, &b]);
    assert_eq!(by_tenant.len(), 3);
    assert!(other.is_empty());
}

#[test]
fn test_hard_delete_removes_event() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(
        &engine,
        &id,
        vec![
            event(&id, 1, EventClass::Create, 1, 1),
            event(&id, 2, EventClass::Patch, 2, 2),
        ],
    );

    engine
        .within_tx(|ctx| engine.aggregates().hard_delete_event(ctx, &id, "1-e2"))
        .unwrap();
    let out = engine
        .without_tx(|ctx| engine.aggregates().load_as_of(ctx, &id, at(100)))
        .unwrap();
    assert_eq!(versions(&out), vec![1]);

    let err = engine
        .within_tx(|ctx| engine.aggregates().hard_delete_event(ctx, &id, "1-e2"))
        .unwrap_err();
    assert!(matches!(err.root(), BitempoError::InvalidInput { .. }));
}

#[test]
fn test_duplicate_event_id_is_rejected() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    seed(&engine, &id, vec![event(&id, 1, EventClass::Create, 1, 1)]);

    let err = engine
        .within_tx(|ctx| {
            engine.aggregates().save(
                ctx,
                vec![],
                vec![event(&id, 1, EventClass::Create, 1, 1)],
                vec![],
            )
        })
        .unwrap_err();
    assert!(matches!(err.root(), BitempoError::UniqueViolation { .. }));
}

#[test]
fn test_undo_close_stream_reopens() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    let events = vec![
        event(&id, 1, EventClass::Create, 1, 1),
        event(&id, 2, EventClass::Patch, 4, 2),
        event(&id, 3, EventClass::Delete, 9, 8),
    ];
    let mut closed = state_after(&id, &events);
    closed.close_time = Some(at(9));
    engine
        .within_tx(|ctx| engine.aggregates().save(ctx, vec![closed], events, vec![]))
        .unwrap();

    engine
        .within_tx(|ctx| engine.aggregates().undo_close_stream(ctx, &id))
        .unwrap();

    let (state, events) = engine
        .without_tx(|ctx| {
            let aggregates = engine.aggregates();
            Ok((
                aggregates.get_aggregate_state(ctx, &id)?,
                aggregates.load_as_of(ctx, &id, at(100))?,
            ))
        })
        .unwrap();
    assert!(!state.is_closed());
    assert_eq!(state.current_version, 2);
    assert_eq!(state.last_transaction_time, at(4));
    assert_eq!(state.latest_valid_time, at(2));
    assert_eq!(versions(&events), vec![1, 2]);
}

#[test]
fn test_undo_close_unknown_stream_is_not_found() {
    let engine = Engine::ephemeral();
    let err = engine
        .within_tx(|ctx| engine.aggregates().undo_close_stream(ctx, &contract("x")))
        .unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// Locks and transaction plumbing
// ============================================================================

#[test]
fn test_aggregate_lock_exclusion_and_idempotent_unlock() {
    let engine = Engine::ephemeral();
    let aggregates = engine.aggregates();
    let a = contract("A");

    aggregates.lock(&[a.clone()]).unwrap();
    let err = aggregates.lock(&[a.clone()]).unwrap_err();
    assert!(err.is_concurrent_access());

    aggregates.unlock(&[a.clone()]).unwrap();
    aggregates.lock(&[a.clone()]).unwrap();
    aggregates.unlock(&[a.clone()]).unwrap();
    aggregates.unlock(&[a.clone()]).unwrap();
    assert!(!aggregates.is_locked(&a));
}

#[test]
fn test_port_call_outside_transaction_fails() {
    let engine = Engine::ephemeral();
    let ctx = bitempo_concurrency::TxContext::new();
    let err = engine
        .aggregates()
        .get_aggregate_state(&ctx, &contract("1"))
        .unwrap_err();
    assert!(matches!(err, BitempoError::NoActiveTransaction));
}

#[test]
fn test_save_in_read_only_transaction_fails() {
    let engine = Engine::ephemeral();
    let id = contract("1");
    let err = engine
        .without_tx(|ctx| {
            engine.aggregates().save(
                ctx,
                vec![],
                vec![event(&id, 1, EventClass::Create, 1, 1)],
                vec![],
            )
        })
        .unwrap_err();
    assert!(matches!(err, BitempoError::ReadOnlyTransaction { .. }));
}
