//! Core types for bitempo
//!
//! This crate defines the foundational types used throughout the system:
//! - AggregateId / ProjectionId: natural keys of event streams and projections
//! - PersistenceEvent / EventClass: one bitemporal fact and its classification
//! - AggregateState, ProjectionState, ProjectionDto, QueueEntry: per-stream and per-projection rows
//! - Span / Spans: time-span algebra used for patch-gap queries
//! - PageSpec, Cursor, SearchCriterion, SortKey: pagination and search requests
//! - EventRegistry: explicit event-type to payload decoder dispatch
//! - Clock: injectable source of "now"
//! - BitempoError: error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod error;
pub mod event;
pub mod registry;
pub mod search_types;
pub mod state;
pub mod timespan;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{BitempoError, BitempoResult, ResultExt};
pub use event::{EventClass, PersistenceEvent};
pub use registry::EventRegistry;
pub use search_types::{
    Cursor, Direction, Operator, PageCursors, PageSpec, SearchCriterion, SortKey,
};
pub use state::{AggregateState, ProjectionDto, ProjectionState, QueueEntry};
pub use timespan::{BoundKind, Span, Spans};
pub use types::{AggregateId, ProjectionId, QueueKey};

/// Timestamp type used for both valid time and transaction time.
pub type Time = chrono::DateTime<chrono::Utc>;

/// The latest representable instant, used as the open end of time ranges.
pub fn far_future() -> Time {
    chrono::DateTime::<chrono::Utc>::MAX_UTC
}
