//! Indexed storage engine for bitempo
//!
//! This crate implements the in-memory table store:
//! - SecondaryIndex: composite-key → row-key sets for prefix/range lookups
//! - Tables: the five logical tables (aggregate-state, event, snapshot,
//!   projection-state, projection-queue) with their indexes
//! - MemStore: `RwLock<Arc<Tables>>` with copy-on-write snapshots
//!
//! # Ordering
//!
//! Iterators returned by the tables make no ordering promise. Callers (the
//! loader, the projecter, the pagination evaluator) sort explicitly.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod index;
pub mod snapshot;
pub mod store;
pub mod tables;

pub use index::SecondaryIndex;
pub use snapshot::StoreSnapshot;
pub use store::MemStore;
pub use tables::{
    AggregateStateTable, EventTable, ProjectionQueueTable, ProjectionStateTable, RowId,
    SnapshotTable, Tables,
};
