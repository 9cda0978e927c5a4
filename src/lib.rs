//! bitempo - embeddable bitemporal event-store persistence engine
//!
//! bitempo stores, per tenant and aggregate type, append-only event streams
//! tagged with two timelines: *valid time* (when a fact holds) and
//! *transaction time* (when it was recorded). It answers point-in-time loads
//! against either timeline, accelerated by snapshots, and feeds read-model
//! projections through durable per-projection queues.
//!
//! # Quick Start
//!
//! ```
//! use bitempo::{AggregateId, AggregateState, Engine, EventClass, PersistenceEvent};
//! use chrono::{TimeZone, Utc};
//!
//! let engine = Engine::ephemeral();
//! let stream = AggregateId::new("acme", "contract", "42");
//! let t = Utc.timestamp_opt(100, 0).unwrap();
//! let created = PersistenceEvent::new(
//!     &stream, 1, "created", EventClass::Create, t, t, serde_json::json!({}),
//! );
//! let state = AggregateState::created(stream.clone(), &created);
//!
//! engine.within_tx(|ctx| {
//!     engine.aggregates().save(ctx, vec![state], vec![created], vec![])
//! })?;
//!
//! let events = engine.without_tx(|ctx| engine.aggregates().load_as_of(ctx, &stream, t))?;
//! assert_eq!(events.len(), 1);
//! # Ok::<(), bitempo::BitempoError>(())
//! ```
//!
//! # Architecture
//!
//! - `bitempo-core`: identifiers, events, errors, time spans, page types
//! - `bitempo-storage`: indexed tables and copy-on-write store
//! - `bitempo-concurrency`: transactions, transactor, advisory locks
//! - `bitempo-engine`: aggregate and projection ports, pagination, config

pub use bitempo_concurrency::{
    DeferrableMode, IsolationLevel, LockTable, MemTransactor, NoopConfigurer,
    PassThroughTransactor, Transaction, TransactionStatus, Transactor, TxConfigurer, TxContext,
    TxMode, TxOptions,
};
pub use bitempo_core::{
    far_future, AggregateId, AggregateState, BitempoError, BitempoResult, BoundKind, Clock,
    Cursor, Direction, EventClass, EventRegistry, FixedClock, Operator, PageCursors, PageSpec,
    PersistenceEvent, ProjectionDto, ProjectionId, ProjectionState, QueueEntry, QueueKey,
    ResultExt, SearchCriterion, SortKey, Span, Spans, SystemClock, Time,
};
pub use bitempo_engine::{
    pagination, AggregateStore, Engine, EngineConfig, ProjectionStore, RunOptions, StreamMap,
    TemporalQuery, CONFIG_FILE_NAME,
};
pub use bitempo_storage::MemStore;
