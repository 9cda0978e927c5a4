//! Error types for bitempo
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Categories
//!
//! - **NotFound**: `AggregateNotFound`, `ProjectionNotFound`
//! - **Empty stream**: `EmptyEventStream`, the key space matched nothing
//! - **Concurrent access**: `AggregateLocked`, `ProjectionLocked`, `ParallelTransaction`
//! - **Transaction outcome**: `CommitFailed`, `RollbackFailed`, `StaleGeneration`
//! - Everything else is an opaque failure meant for operator diagnostics
//!
//! Internal helpers wrap errors with operation context via [`ResultExt`].
//! The `is_*` predicates look through every context layer, so callers can
//! branch on the category regardless of how deep the error was raised.

use crate::types::{AggregateId, ProjectionId};
use crate::Time;
use thiserror::Error;

/// Result type alias for bitempo operations
pub type BitempoResult<T> = std::result::Result<T, BitempoError>;

/// Error types for the bitempo engine
#[derive(Debug, Error)]
pub enum BitempoError {
    /// No aggregate state exists for the key
    #[error("aggregate not found: {id}")]
    AggregateNotFound {
        /// Requested stream
        id: AggregateId,
    },

    /// No projection state exists for the key
    #[error("projection not found: {id}")]
    ProjectionNotFound {
        /// Requested projection
        id: ProjectionId,
    },

    /// The requested key space contains no events at all
    #[error("empty event stream: {scope}")]
    EmptyEventStream {
        /// Human-readable description of the key space
        scope: String,
    },

    /// The aggregate is already locked by another caller
    #[error("concurrent access: aggregate {id} is locked")]
    AggregateLocked {
        /// Contended stream
        id: AggregateId,
    },

    /// The projection is already locked by another caller
    #[error("concurrent access: projection {id} is locked")]
    ProjectionLocked {
        /// Contended projection
        id: ProjectionId,
    },

    /// Another write transaction is already running
    #[error("parallel transaction: a write transaction is already active")]
    ParallelTransaction,

    /// The store moved past the generation a write transaction started from
    #[error("stale generation: transaction based on {base_version}, store at {current_version}")]
    StaleGeneration {
        /// Generation the working copy was taken from
        base_version: u64,
        /// Generation published in the meantime
        current_version: u64,
    },

    /// The call context carries no transaction
    #[error("no active transaction in context")]
    NoActiveTransaction,

    /// A write was attempted through a read-only transaction
    #[error("transaction {txn_id} is read-only")]
    ReadOnlyTransaction {
        /// Offending transaction
        txn_id: u64,
    },

    /// The transaction is no longer active
    #[error("transaction {txn_id} is not active: {state}")]
    TransactionNotActive {
        /// Offending transaction
        txn_id: u64,
        /// Current state
        state: String,
    },

    /// Committing the transaction failed
    #[error("commit failed: {cause}")]
    CommitFailed {
        /// Why the commit failed
        cause: Box<BitempoError>,
    },

    /// Aborting the transaction failed; `original` is the error that triggered the abort
    #[error("rollback failed: {cause} (while handling: {original})")]
    RollbackFailed {
        /// Why the abort failed
        cause: Box<BitempoError>,
        /// Error returned by the transaction body
        #[source]
        original: Box<BitempoError>,
    },

    /// The snapshot's valid time lies inside a patch interval
    #[error("snapshot at {valid_time} for {id} rejected: inside interval of patch {patch_event_id}")]
    SnapshotRejected {
        /// Target stream
        id: AggregateId,
        /// Valid time of the rejected snapshot
        valid_time: Time,
        /// Patch whose interval contains the snapshot
        patch_event_id: String,
    },

    /// A unique index already contains the key
    #[error("unique constraint violated on {table}: {key}")]
    UniqueViolation {
        /// Table name
        table: &'static str,
        /// Offending key
        key: String,
    },

    /// Invalid request input
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Details
        message: String,
    },

    /// Invalid engine configuration
    #[error("configuration error: {message}")]
    Config {
        /// Details
        message: String,
    },

    /// Storage layer error
    #[error("storage error: {message}")]
    Storage {
        /// Details
        message: String,
        /// Underlying error, if any
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A stored row failed its expected shape
    #[error("data corruption: {message}")]
    Corruption {
        /// Details
        message: String,
    },

    /// An event payload could not be decoded
    #[error("cannot decode event type '{event_type}': {message}")]
    Decode {
        /// Event type tag
        event_type: String,
        /// Details
        message: String,
    },

    /// An error annotated with the operation that produced it
    #[error("{context}: {source}")]
    Context {
        /// Operation description
        context: String,
        /// Wrapped error
        #[source]
        source: Box<BitempoError>,
    },
}

impl BitempoError {
    /// Create an InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        BitempoError::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        BitempoError::Config {
            message: message.into(),
        }
    }

    /// Create a Storage error without an underlying source
    pub fn storage(message: impl Into<String>) -> Self {
        BitempoError::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Storage error wrapping an underlying error
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BitempoError::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a Corruption error
    pub fn corruption(message: impl Into<String>) -> Self {
        BitempoError::Corruption {
            message: message.into(),
        }
    }

    /// Create an EmptyEventStream error
    pub fn empty_stream(scope: impl Into<String>) -> Self {
        BitempoError::EmptyEventStream {
            scope: scope.into(),
        }
    }

    /// Wrap this error with operation context
    pub fn context(self, context: impl Into<String>) -> Self {
        BitempoError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error below all context layers
    pub fn root(&self) -> &BitempoError {
        let mut current = self;
        while let BitempoError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Aggregate or projection absent
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            BitempoError::AggregateNotFound { .. } | BitempoError::ProjectionNotFound { .. }
        )
    }

    /// The requested key space matched no events
    pub fn is_empty_stream(&self) -> bool {
        matches!(self.root(), BitempoError::EmptyEventStream { .. })
    }

    /// Aggregate or projection already locked
    pub fn is_concurrent_access(&self) -> bool {
        matches!(
            self.root(),
            BitempoError::AggregateLocked { .. } | BitempoError::ProjectionLocked { .. }
        )
    }

    /// A second write transaction was rejected
    pub fn is_parallel_transaction(&self) -> bool {
        matches!(self.root(), BitempoError::ParallelTransaction)
    }
}

/// Attach operation context to errors
pub trait ResultExt<T> {
    /// Wrap the error with a fixed context string
    fn context(self, context: impl Into<String>) -> BitempoResult<T>;

    /// Wrap the error with a lazily built context string
    fn with_context<F, S>(self, f: F) -> BitempoResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for BitempoResult<T> {
    fn context(self, context: impl Into<String>) -> BitempoResult<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, S>(self, f: F) -> BitempoResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}
