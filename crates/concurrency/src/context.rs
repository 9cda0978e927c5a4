//! Call-scoped transaction context
//!
//! Every store operation takes a `&mut TxContext` and extracts the live
//! transaction from it. The transactor installs the transaction before running
//! the caller's closure and removes it afterwards, so an operation invoked
//! outside `within_tx` / `without_tx` fails with `NoActiveTransaction`.

use bitempo_core::{BitempoError, BitempoResult};

use crate::transaction::Transaction;

/// Holder of the transaction active for the current call
#[derive(Debug, Default)]
pub struct TxContext {
    tx: Option<Transaction>,
}

impl TxContext {
    /// Context without a transaction
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that already carries `tx`, for use with `PassThroughTransactor`
    pub fn with_transaction(tx: Transaction) -> Self {
        Self { tx: Some(tx) }
    }

    /// The active transaction
    pub fn tx(&self) -> BitempoResult<&Transaction> {
        self.tx.as_ref().ok_or(BitempoError::NoActiveTransaction)
    }

    /// The active transaction, mutably
    pub fn tx_mut(&mut self) -> BitempoResult<&mut Transaction> {
        self.tx.as_mut().ok_or(BitempoError::NoActiveTransaction)
    }

    /// True if a transaction is installed
    pub fn has_tx(&self) -> bool {
        self.tx.is_some()
    }

    /// Remove and return the installed transaction
    pub fn into_transaction(self) -> Option<Transaction> {
        self.tx
    }

    /// Install `tx`, returning whatever was installed before
    pub(crate) fn install(&mut self, tx: Transaction) -> Option<Transaction> {
        self.tx.replace(tx)
    }

    /// Take the installed transaction out, restoring `previous`
    pub(crate) fn swap_out(&mut self, previous: Option<Transaction>) -> Option<Transaction> {
        std::mem::replace(&mut self.tx, previous)
    }
}
