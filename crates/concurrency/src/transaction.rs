//! Transaction handle
//!
//! A `Transaction` is one unit of work over a `MemStore`:
//! - **read-only**: holds a `StoreSnapshot`; many may run at once
//! - **read-write**: holds a private working copy of the tables plus the
//!   transactor's writer permit; its writes are visible to itself only until
//!   `commit` publishes them
//!
//! State transitions:
//! - `Active` → `Committed` (commit)
//! - `Active` → `Aborted` (abort)
//!
//! Terminal states (no transitions allowed):
//! - `Committed`
//! - `Aborted`

use std::sync::Arc;

use bitempo_core::{BitempoError, BitempoResult};
use bitempo_storage::{MemStore, StoreSnapshot, Tables};
use tracing::{debug, warn};

use crate::options::TxOptions;
use crate::transactor::WriterPermit;

/// Status of a transaction in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is executing, can read (and write, if read-write)
    Active,
    /// Transaction committed successfully
    Committed,
    /// Transaction was aborted
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

impl TransactionStatus {
    fn describe(&self) -> String {
        match self {
            TransactionStatus::Active => "active".to_string(),
            TransactionStatus::Committed => "committed".to_string(),
            TransactionStatus::Aborted { reason } => format!("aborted ({})", reason),
        }
    }
}

/// Whether a transaction may write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxMode {
    /// Reads only; commits unconditionally
    ReadOnly,
    /// Reads and writes; at most one at a time
    ReadWrite,
}

enum TxView {
    Snapshot(StoreSnapshot),
    Working { base_version: u64, tables: Box<Tables> },
}

/// A live transaction
pub struct Transaction {
    txn_id: u64,
    status: TransactionStatus,
    options: TxOptions,
    view: TxView,
    store: Arc<MemStore>,
    /// Held for the lifetime of a read-write transaction
    permit: Option<WriterPermit>,
}

impl Transaction {
    pub(crate) fn begin_read(txn_id: u64, store: Arc<MemStore>, options: TxOptions) -> Self {
        let snapshot = store.snapshot();
        debug!(
            target: "bitempo::txn",
            txn_id,
            version = snapshot.version(),
            "read transaction started"
        );
        Self {
            txn_id,
            status: TransactionStatus::Active,
            options,
            view: TxView::Snapshot(snapshot),
            store,
            permit: None,
        }
    }

    pub(crate) fn begin_write(
        txn_id: u64,
        store: Arc<MemStore>,
        permit: WriterPermit,
        options: TxOptions,
    ) -> Self {
        let snapshot = store.snapshot();
        let base_version = snapshot.version();
        debug!(
            target: "bitempo::txn",
            txn_id,
            base_version,
            isolation = %options.isolation_level,
            "write transaction started"
        );
        Self {
            txn_id,
            status: TransactionStatus::Active,
            options,
            view: TxView::Working {
                base_version,
                tables: Box::new(snapshot.to_working_copy()),
            },
            store,
            permit: Some(permit),
        }
    }

    /// Transaction id, unique per transactor
    pub fn id(&self) -> u64 {
        self.txn_id
    }

    /// Read-only or read-write
    pub fn mode(&self) -> TxMode {
        match self.view {
            TxView::Snapshot(_) => TxMode::ReadOnly,
            TxView::Working { .. } => TxMode::ReadWrite,
        }
    }

    /// True for read-only transactions
    pub fn is_read_only(&self) -> bool {
        self.mode() == TxMode::ReadOnly
    }

    /// Current status
    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    /// True while the transaction can still be used
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// Options the transaction was started with
    pub fn options(&self) -> &TxOptions {
        &self.options
    }

    /// Store generation the transaction started from
    pub fn base_version(&self) -> u64 {
        match &self.view {
            TxView::Snapshot(snapshot) => snapshot.version(),
            TxView::Working { base_version, .. } => *base_version,
        }
    }

    /// Tables visible to this transaction, including its own writes
    pub fn tables(&self) -> BitempoResult<&Tables> {
        self.ensure_active()?;
        Ok(match &self.view {
            TxView::Snapshot(snapshot) => snapshot.tables(),
            TxView::Working { tables, .. } => tables.as_ref(),
        })
    }

    /// Mutable tables; fails on read-only transactions
    pub fn tables_mut(&mut self) -> BitempoResult<&mut Tables> {
        self.ensure_active()?;
        match &mut self.view {
            TxView::Snapshot(_) => Err(BitempoError::ReadOnlyTransaction {
                txn_id: self.txn_id,
            }),
            TxView::Working { tables, .. } => Ok(tables.as_mut()),
        }
    }

    /// Commit, returning the store generation the transaction produced
    ///
    /// Read-only transactions commit unconditionally and return the generation
    /// they read. Read-write transactions publish their working copy; if the
    /// store has moved past their base generation the commit fails and the
    /// transaction ends aborted.
    pub fn commit(&mut self) -> BitempoResult<u64> {
        self.ensure_active()?;
        let published = match &mut self.view {
            TxView::Snapshot(snapshot) => Ok(snapshot.version()),
            TxView::Working {
                base_version,
                tables,
            } => {
                let tables = std::mem::take(tables.as_mut());
                self.store.publish(*base_version, tables)
            }
        };
        let version = match published {
            Ok(version) => version,
            Err(err) => {
                debug!(target: "bitempo::txn", txn_id = self.txn_id, error = %err, "commit rejected");
                self.status = TransactionStatus::Aborted {
                    reason: err.to_string(),
                };
                self.permit = None;
                return Err(err);
            }
        };
        self.status = TransactionStatus::Committed;
        self.permit = None;
        debug!(target: "bitempo::txn", txn_id = self.txn_id, version, "transaction committed");
        Ok(version)
    }

    /// Abort, discarding every write
    pub fn abort(&mut self, reason: impl Into<String>) -> BitempoResult<()> {
        self.ensure_active()?;
        let reason = reason.into();
        if let TxView::Working { tables, .. } = &mut self.view {
            **tables = Tables::default();
        }
        debug!(target: "bitempo::txn", txn_id = self.txn_id, reason = %reason, "transaction aborted");
        self.status = TransactionStatus::Aborted { reason };
        self.permit = None;
        Ok(())
    }

    fn ensure_active(&self) -> BitempoResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(BitempoError::TransactionNotActive {
                txn_id: self.txn_id,
                state: self.status.describe(),
            })
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() && !self.is_read_only() {
            warn!(
                target: "bitempo::txn",
                txn_id = self.txn_id,
                "write transaction dropped while active, discarding writes"
            );
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("txn_id", &self.txn_id)
            .field("mode", &self.mode())
            .field("status", &self.status)
            .field("base_version", &self.base_version())
            .finish()
    }
}
