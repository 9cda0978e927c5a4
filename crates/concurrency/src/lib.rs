//! Concurrency layer for bitempo
//!
//! This crate implements the transaction boundary and advisory locking:
//! - Transaction: one read-only or read-write unit of work over a store generation
//! - TxContext: call-scoped holder of the active transaction (GetTX)
//! - Transactor: `within_tx` / `without_tx` entry points
//!   - MemTransactor: single-writer transactor over a `MemStore`
//!   - PassThroughTransactor: reuses a transaction the caller already opened
//! - TxOptions: isolation level and deferrable mode hooks
//! - LockTable: advisory, non-reentrant, key-scoped locks
//!
//! ## Write exclusivity
//!
//! A `MemTransactor` admits one write transaction at a time. A second
//! `within_tx` while one is active fails immediately with
//! `BitempoError::ParallelTransaction`; it never waits.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod lock;
pub mod options;
pub mod transaction;
pub mod transactor;

pub use context::TxContext;
pub use lock::LockTable;
pub use options::{DeferrableMode, IsolationLevel, TxOptions};
pub use transaction::{Transaction, TransactionStatus, TxMode};
pub use transactor::{
    MemTransactor, NoopConfigurer, PassThroughTransactor, Transactor, TxConfigurer, WriterPermit,
    WriterSlot,
};
