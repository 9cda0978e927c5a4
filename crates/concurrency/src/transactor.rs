//! Transactor: transaction boundaries
//!
//! `within_tx` runs a closure inside a read-write transaction and
//! `without_tx` inside a read-only one:
//!
//! ```text
//! 1. begin (write: acquire the writer slot or fail with ParallelTransaction)
//! 2. hand the options to the TxConfigurer
//! 3. install the transaction into the TxContext and run the closure
//! 4. Ok  → commit; a failing commit becomes CommitFailed
//!    Err → abort;  a failing abort becomes RollbackFailed (original error kept as source)
//! 5. restore the context to what it held before
//! ```
//!
//! Commit and abort report failure through `BitempoResult`; nothing unwinds.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bitempo_core::{BitempoError, BitempoResult};
use bitempo_storage::MemStore;
use tracing::debug;

use crate::context::TxContext;
use crate::options::TxOptions;
use crate::transaction::{Transaction, TxMode};

// ============================================================================
// Writer slot
// ============================================================================

/// Single-writer semaphore owned by a transactor
///
/// Acquisition never blocks: it either succeeds now or fails.
#[derive(Debug, Default)]
pub struct WriterSlot {
    busy: AtomicBool,
}

impl WriterSlot {
    /// A free slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot if it is free
    pub fn try_acquire(self: &Arc<Self>) -> Option<WriterPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| WriterPermit {
                slot: Arc::clone(self),
            })
    }

    /// True while a permit is outstanding
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of holding the writer slot; released on drop
#[derive(Debug)]
pub struct WriterPermit {
    slot: Arc<WriterSlot>,
}

impl Drop for WriterPermit {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

// ============================================================================
// Configuration hook
// ============================================================================

/// Backend hook receiving the options of every new transaction
///
/// A relational backend translates the options into its own session
/// directives here.
pub trait TxConfigurer: Send + Sync {
    /// Apply `options` to the transaction `txn_id` that is about to run
    fn configure(&self, txn_id: u64, mode: TxMode, options: &TxOptions) -> BitempoResult<()>;
}

/// Configurer that accepts every option and does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConfigurer;

impl TxConfigurer for NoopConfigurer {
    fn configure(&self, _txn_id: u64, _mode: TxMode, _options: &TxOptions) -> BitempoResult<()> {
        Ok(())
    }
}

// ============================================================================
// Transactor
// ============================================================================

/// Transaction boundary contract
pub trait Transactor: Send + Sync {
    /// Run `f` inside a read-write transaction
    fn within_tx<T, F>(&self, ctx: &mut TxContext, options: TxOptions, f: F) -> BitempoResult<T>
    where
        F: FnOnce(&mut TxContext) -> BitempoResult<T>;

    /// Run `f` inside a read-only transaction
    fn without_tx<T, F>(&self, ctx: &mut TxContext, options: TxOptions, f: F) -> BitempoResult<T>
    where
        F: FnOnce(&mut TxContext) -> BitempoResult<T>;
}

/// Transactor over a `MemStore` admitting one writer at a time
pub struct MemTransactor {
    store: Arc<MemStore>,
    writer: Arc<WriterSlot>,
    next_txn_id: AtomicU64,
    configurer: Arc<dyn TxConfigurer>,
}

impl MemTransactor {
    /// Transactor over `store` with the no-op configurer
    pub fn new(store: Arc<MemStore>) -> Self {
        Self {
            store,
            writer: Arc::new(WriterSlot::new()),
            next_txn_id: AtomicU64::new(1),
            configurer: Arc::new(NoopConfigurer),
        }
    }

    /// Replace the configuration hook
    pub fn with_configurer(mut self, configurer: Arc<dyn TxConfigurer>) -> Self {
        self.configurer = configurer;
        self
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<MemStore> {
        &self.store
    }

    /// True while a write transaction is active
    pub fn is_write_active(&self) -> bool {
        self.writer.is_busy()
    }

    /// Begin a transaction without installing it anywhere
    ///
    /// The caller owns the returned transaction and must commit or abort it.
    /// Fails with `ParallelTransaction` if `mode` is read-write and another
    /// write transaction is active.
    pub fn begin(&self, mode: TxMode, options: TxOptions) -> BitempoResult<Transaction> {
        let txn = match mode {
            TxMode::ReadOnly => {
                let txn_id = self.next_txn_id();
                Transaction::begin_read(txn_id, Arc::clone(&self.store), options)
            }
            TxMode::ReadWrite => {
                let permit = self
                    .writer
                    .try_acquire()
                    .ok_or(BitempoError::ParallelTransaction)?;
                let txn_id = self.next_txn_id();
                Transaction::begin_write(txn_id, Arc::clone(&self.store), permit, options)
            }
        };
        self.configurer.configure(txn.id(), mode, &options)?;
        Ok(txn)
    }

    fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::Relaxed)
    }

    fn run<T, F>(
        &self,
        ctx: &mut TxContext,
        mode: TxMode,
        options: TxOptions,
        f: F,
    ) -> BitempoResult<T>
    where
        F: FnOnce(&mut TxContext) -> BitempoResult<T>,
    {
        let txn = self.begin(mode, options)?;
        let previous = ctx.install(txn);
        let result = f(ctx);
        match ctx.swap_out(previous) {
            Some(txn) => finish(txn, result),
            None => Err(BitempoError::corruption(
                "transaction vanished from context before completion",
            )),
        }
    }
}

impl Transactor for MemTransactor {
    fn within_tx<T, F>(&self, ctx: &mut TxContext, options: TxOptions, f: F) -> BitempoResult<T>
    where
        F: FnOnce(&mut TxContext) -> BitempoResult<T>,
    {
        self.run(ctx, TxMode::ReadWrite, options, f)
    }

    fn without_tx<T, F>(&self, ctx: &mut TxContext, options: TxOptions, f: F) -> BitempoResult<T>
    where
        F: FnOnce(&mut TxContext) -> BitempoResult<T>,
    {
        self.run(ctx, TxMode::ReadOnly, options, f)
    }
}

impl std::fmt::Debug for MemTransactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemTransactor")
            .field("store_version", &self.store.current_version())
            .field("write_active", &self.is_write_active())
            .finish()
    }
}

/// Commit on success, abort on failure
fn finish<T>(mut txn: Transaction, result: BitempoResult<T>) -> BitempoResult<T> {
    match result {
        Ok(value) => match txn.commit() {
            Ok(_) => Ok(value),
            Err(cause) => Err(BitempoError::CommitFailed {
                cause: Box::new(cause),
            }),
        },
        Err(original) => match txn.abort(original.to_string()) {
            Ok(()) => Err(original),
            Err(cause) => Err(BitempoError::RollbackFailed {
                cause: Box::new(cause),
                original: Box::new(original),
            }),
        },
    }
}

/// Transactor that reuses the transaction already installed in the context
///
/// Neither commits nor aborts: the owner of the transaction does. Intended for
/// tests that drive several operations through one externally managed
/// transaction.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughTransactor;

impl PassThroughTransactor {
    fn run<T, F>(ctx: &mut TxContext, f: F) -> BitempoResult<T>
    where
        F: FnOnce(&mut TxContext) -> BitempoResult<T>,
    {
        ctx.tx()?;
        f(ctx)
    }
}

impl Transactor for PassThroughTransactor {
    fn within_tx<T, F>(&self, ctx: &mut TxContext, _options: TxOptions, f: F) -> BitempoResult<T>
    where
        F: FnOnce(&mut TxContext) -> BitempoResult<T>,
    {
        if ctx.tx()?.is_read_only() {
            return Err(BitempoError::ReadOnlyTransaction {
                txn_id: ctx.tx()?.id(),
            });
        }
        debug!(target: "bitempo::txn", txn_id = ctx.tx()?.id(), "reusing transaction");
        Self::run(ctx, f)
    }

    fn without_tx<T, F>(&self, ctx: &mut TxContext, _options: TxOptions, f: F) -> BitempoResult<T>
    where
        F: FnOnce(&mut TxContext) -> BitempoResult<T>,
    {
        Self::run(ctx, f)
    }
}
