//! Engine: the assembled stack
//!
//! Owns one store, its transactor and the two persistence ports, configured
//! from an [`EngineConfig`].

use std::path::Path;
use std::sync::Arc;

use bitempo_concurrency::{MemTransactor, Transactor, TxContext, TxOptions};
use bitempo_core::{BitempoResult, Clock, SystemClock};
use bitempo_storage::MemStore;
use tracing::debug;

use crate::aggregate::AggregateStore;
use crate::config::EngineConfig;
use crate::projection::{ProjectionStore, RunOptions};

/// In-memory bitemporal event store
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    tx_options: TxOptions,
    transactor: MemTransactor,
    aggregates: AggregateStore,
    projections: ProjectionStore,
}

impl Engine {
    /// Build an engine from a validated config, driven by the wall clock
    pub fn open(config: EngineConfig) -> BitempoResult<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Build an engine whose projection queue reads "now" from `clock`
    pub fn open_with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> BitempoResult<Self> {
        let tx_options = config.tx_options()?;
        debug!(
            target: "bitempo::txn",
            isolation = %tx_options.isolation_level,
            deferrable = %tx_options.deferrable_mode,
            chunk_size = config.projection.chunk_size,
            "engine opened"
        );
        Ok(Self {
            tx_options,
            transactor: MemTransactor::new(Arc::new(MemStore::new())),
            aggregates: AggregateStore::new(),
            projections: ProjectionStore::with_clock(clock),
            config,
        })
    }

    /// Build an engine from a `bitempo.toml` file
    pub fn from_file(path: &Path) -> BitempoResult<Self> {
        Self::open(EngineConfig::from_file(path)?)
    }

    /// Engine with the default config
    pub fn ephemeral() -> Self {
        let config = EngineConfig::default();
        Self {
            tx_options: TxOptions::default(),
            transactor: MemTransactor::new(Arc::new(MemStore::new())),
            aggregates: AggregateStore::new(),
            projections: ProjectionStore::new(),
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Transaction options derived from the config
    pub fn tx_options(&self) -> TxOptions {
        self.tx_options
    }

    /// Queue-run options derived from the config
    pub fn run_options(&self) -> RunOptions {
        RunOptions::with_chunk_size(self.config.projection.chunk_size)
    }

    /// The transactor
    pub fn transactor(&self) -> &MemTransactor {
        &self.transactor
    }

    /// The aggregate port
    pub fn aggregates(&self) -> &AggregateStore {
        &self.aggregates
    }

    /// The projection port
    pub fn projections(&self) -> &ProjectionStore {
        &self.projections
    }

    /// Run `f` in a fresh write transaction with the configured options
    pub fn within_tx<T, F>(&self, f: F) -> BitempoResult<T>
    where
        F: FnOnce(&mut TxContext) -> BitempoResult<T>,
    {
        let mut ctx = TxContext::new();
        self.transactor.within_tx(&mut ctx, self.tx_options, f)
    }

    /// Run `f` in a fresh read-only transaction with the configured options
    pub fn without_tx<T, F>(&self, f: F) -> BitempoResult<T>
    where
        F: FnOnce(&mut TxContext) -> BitempoResult<T>,
    {
        let mut ctx = TxContext::new();
        self.transactor.without_tx(&mut ctx, self.tx_options, f)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::ephemeral()
    }
}
