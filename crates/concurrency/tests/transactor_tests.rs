//! Integration tests for transaction boundaries
//!
//! Cover commit/rollback outcomes, failure wrapping, reader isolation and the
//! single-writer rule across threads.

use std::sync::{Arc, Barrier};
use std::thread;

use bitempo_concurrency::{
    LockTable, MemTransactor, PassThroughTransactor, Transactor, TxConfigurer, TxContext, TxMode,
    TxOptions,
};
use bitempo_core::{
    AggregateId, AggregateState, BitempoError, BitempoResult, EventClass, PersistenceEvent,
};
use bitempo_storage::MemStore;
use chrono::Utc;

fn state(id: &str) -> AggregateState {
    let stream = AggregateId::new("t", "contract", id);
    let now = Utc::now();
    let first = PersistenceEvent::new(
        &stream,
        1,
        "created",
        EventClass::Create,
        now,
        now,
        serde_json::json!({}),
    );
    AggregateState::created(stream, &first)
}

fn insert_state(ctx: &mut TxContext, id: &str) -> BitempoResult<()> {
    ctx.tx_mut()?.tables_mut()?.aggregate_states.upsert(state(id));
    Ok(())
}

fn count_states(transactor: &MemTransactor) -> usize {
    let mut ctx = TxContext::new();
    transactor
        .without_tx(&mut ctx, TxOptions::default(), |ctx| {
            Ok(ctx.tx()?.tables()?.aggregate_states.len())
        })
        .unwrap()
}

// ============================================================================
// Commit and rollback
// ============================================================================

#[test]
fn test_within_tx_commits_on_success() {
    let transactor = MemTransactor::new(Arc::new(MemStore::new()));
    let mut ctx = TxContext::new();

    let out = transactor
        .within_tx(&mut ctx, TxOptions::default(), |ctx| {
            insert_state(ctx, "1")?;
            Ok(42)
        })
        .unwrap();

    assert_eq!(out, 42);
    assert_eq!(count_states(&transactor), 1);
    assert!(!ctx.has_tx());
    assert!(!transactor.is_write_active());
}

#[test]
fn test_within_tx_rolls_back_on_error() {
    let transactor = MemTransactor::new(Arc::new(MemStore::new()));
    let mut ctx = TxContext::new();

    let err = transactor
        .within_tx(&mut ctx, TxOptions::default(), |ctx| -> BitempoResult<()> {
            insert_state(ctx, "1")?;
            Err(BitempoError::invalid_input("boom"))
        })
        .unwrap_err();

    assert!(matches!(err, BitempoError::InvalidInput { .. }));
    assert_eq!(count_states(&transactor), 0);
    assert!(!transactor.is_write_active());
}

#[test]
fn test_commit_failure_is_wrapped() {
    let transactor = MemTransactor::new(Arc::new(MemStore::new()));
    let mut ctx = TxContext::new();

    // Committing inside the closure leaves nothing for the boundary to commit
    let err = transactor
        .within_tx(&mut ctx, TxOptions::default(), |ctx| {
            ctx.tx_mut()?.commit()?;
            Ok(())
        })
        .unwrap_err();

    match err {
        BitempoError::CommitFailed { cause } => {
            assert!(matches!(*cause, BitempoError::TransactionNotActive { .. }))
        }
        other => panic!("expected CommitFailed, got {other:?}"),
    }
}

#[test]
fn test_second_writer_on_shared_store_fails_commit() {
    let store = Arc::new(MemStore::new());
    let first = MemTransactor::new(Arc::clone(&store));
    let second = MemTransactor::new(Arc::clone(&store));
    let mut ctx = TxContext::new();

    let err = first
        .within_tx(&mut ctx, TxOptions::default(), |ctx| {
            insert_state(ctx, "1")?;
            // Another transactor publishes while this one is open
            let mut other = TxContext::new();
            second.within_tx(&mut other, TxOptions::default(), |ctx| insert_state(ctx, "2"))
        })
        .unwrap_err();

    match err {
        BitempoError::CommitFailed { cause } => assert!(matches!(
            *cause,
            BitempoError::StaleGeneration {
                base_version: 0,
                current_version: 1
            }
        )),
        other => panic!("expected CommitFailed, got {other:?}"),
    }

    // Only the winner's write is visible and both slots are free again
    let states = count_states(&first);
    assert_eq!(states, 1);
    assert_eq!(store.current_version(), 1);
    assert!(!first.is_write_active());
    assert!(!second.is_write_active());
    assert!(first
        .within_tx(&mut ctx, TxOptions::default(), |ctx| insert_state(ctx, "3"))
        .is_ok());
    assert_eq!(count_states(&second), 2);
}

#[test]
fn test_rollback_failure_keeps_original_error() {
    let transactor = MemTransactor::new(Arc::new(MemStore::new()));
    let mut ctx = TxContext::new();

    let err = transactor
        .within_tx(&mut ctx, TxOptions::default(), |ctx| -> BitempoResult<()> {
            ctx.tx_mut()?.abort("early")?;
            Err(BitempoError::invalid_input("original"))
        })
        .unwrap_err();

    match err {
        BitempoError::RollbackFailed { cause, original } => {
            assert!(matches!(*cause, BitempoError::TransactionNotActive { .. }));
            assert!(matches!(*original, BitempoError::InvalidInput { .. }));
        }
        other => panic!("expected RollbackFailed, got {other:?}"),
    }
}

#[test]
fn test_without_tx_rejects_writes() {
    let transactor = MemTransactor::new(Arc::new(MemStore::new()));
    let mut ctx = TxContext::new();

    let err = transactor
        .without_tx(&mut ctx, TxOptions::default(), |ctx| insert_state(ctx, "1"))
        .unwrap_err();
    assert!(matches!(err, BitempoError::ReadOnlyTransaction { .. }));
}

// ============================================================================
// Isolation
// ============================================================================

#[test]
fn test_readers_do_not_see_uncommitted_writes() {
    let transactor = MemTransactor::new(Arc::new(MemStore::new()));
    let mut writer = transactor
        .begin(TxMode::ReadWrite, TxOptions::default())
        .unwrap();
    writer
        .tables_mut()
        .unwrap()
        .aggregate_states
        .upsert(state("1"));

    assert_eq!(count_states(&transactor), 0);

    let reader = transactor
        .begin(TxMode::ReadOnly, TxOptions::default())
        .unwrap();
    writer.commit().unwrap();

    // A reader keeps the generation it started from
    assert!(reader.tables().unwrap().aggregate_states.is_empty());
    assert_eq!(count_states(&transactor), 1);
}

#[test]
fn test_second_writer_fails_immediately() {
    let transactor = Arc::new(MemTransactor::new(Arc::new(MemStore::new())));
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));

    let holder = {
        let transactor = Arc::clone(&transactor);
        let entered = Arc::clone(&entered);
        let release = Arc::clone(&release);
        thread::spawn(move || {
            let mut ctx = TxContext::new();
            transactor.within_tx(&mut ctx, TxOptions::default(), |ctx| {
                insert_state(ctx, "1")?;
                entered.wait();
                release.wait();
                Ok(())
            })
        })
    };

    entered.wait();
    let mut ctx = TxContext::new();
    let err = transactor
        .within_tx(&mut ctx, TxOptions::default(), |ctx| insert_state(ctx, "2"))
        .unwrap_err();
    assert!(err.is_parallel_transaction());
    release.wait();

    holder.join().unwrap().unwrap();
    assert_eq!(count_states(&transactor), 1);

    // Slot is free again after the first writer finished
    let mut ctx = TxContext::new();
    transactor
        .within_tx(&mut ctx, TxOptions::default(), |ctx| insert_state(ctx, "2"))
        .unwrap();
    assert_eq!(count_states(&transactor), 2);
}

// ============================================================================
// Pass-through and configuration
// ============================================================================

#[test]
fn test_pass_through_leaves_boundary_to_owner() {
    let transactor = MemTransactor::new(Arc::new(MemStore::new()));
    let txn = transactor
        .begin(TxMode::ReadWrite, TxOptions::default())
        .unwrap();
    let mut ctx = TxContext::with_transaction(txn);

    PassThroughTransactor
        .within_tx(&mut ctx, TxOptions::default(), |ctx| insert_state(ctx, "1"))
        .unwrap();
    PassThroughTransactor
        .within_tx(&mut ctx, TxOptions::default(), |ctx| insert_state(ctx, "2"))
        .unwrap();

    // Not committed yet
    assert_eq!(count_states(&transactor), 0);

    let mut txn = ctx.into_transaction().unwrap();
    txn.commit().unwrap();
    assert_eq!(count_states(&transactor), 2);
}

struct RejectingConfigurer;

impl TxConfigurer for RejectingConfigurer {
    fn configure(&self, _txn_id: u64, mode: TxMode, _options: &TxOptions) -> BitempoResult<()> {
        match mode {
            TxMode::ReadWrite => Err(BitempoError::config("writes disabled")),
            TxMode::ReadOnly => Ok(()),
        }
    }
}

#[test]
fn test_configurer_failure_aborts_begin() {
    let transactor = MemTransactor::new(Arc::new(MemStore::new()))
        .with_configurer(Arc::new(RejectingConfigurer));
    let mut ctx = TxContext::new();

    let err = transactor
        .within_tx(&mut ctx, TxOptions::default(), |ctx| insert_state(ctx, "1"))
        .unwrap_err();
    assert!(matches!(err, BitempoError::Config { .. }));
    assert!(!transactor.is_write_active());
    assert_eq!(count_states(&transactor), 0);
}

// ============================================================================
// Locks
// ============================================================================

#[test]
fn test_locks_survive_rollback() {
    let transactor = MemTransactor::new(Arc::new(MemStore::new()));
    let locks: LockTable<String> = LockTable::new();
    let mut ctx = TxContext::new();

    let _ = transactor.within_tx(&mut ctx, TxOptions::default(), |_| -> BitempoResult<()> {
        locks
            .lock(&["k".to_string()])
            .map_err(|k| BitempoError::invalid_input(k))?;
        Err(BitempoError::invalid_input("fail after locking"))
    });

    assert!(locks.is_locked(&"k".to_string()));
}

#[test]
fn test_locks_contend_across_threads() {
    let locks: Arc<LockTable<String>> = Arc::new(LockTable::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let locks = Arc::clone(&locks);
            thread::spawn(move || locks.lock(&["shared".to_string()]).is_ok())
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}
