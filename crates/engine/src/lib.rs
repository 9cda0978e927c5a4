//! Bitemporal engine for bitempo
//!
//! This crate assembles the lower layers into the persistence ports:
//! - AggregateStore: bitemporal loads, saves with snapshot admissibility, deletes
//! - ProjectionStore: projection state and chunked queue delivery
//! - pagination: search, sort and cursor paging over events
//! - EngineConfig: `bitempo.toml`
//! - Engine: store + transactor + ports in one value
//!
//! Every port operation reads or writes through the transaction installed in
//! the `TxContext` it is given.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod pagination;
pub mod projection;

pub use aggregate::{AggregateStore, StreamMap, TemporalQuery};
pub use config::{EngineConfig, ProjectionConfig, TransactionConfig, CONFIG_FILE_NAME};
pub use engine::Engine;
pub use projection::{ProjectionStore, RunOptions};

use bitempo_concurrency::TxContext;
use bitempo_core::BitempoResult;
use bitempo_storage::Tables;

/// Tables visible to the context's transaction
pub(crate) fn read_tables(ctx: &TxContext) -> BitempoResult<&Tables> {
    ctx.tx()?.tables()
}

/// Writable tables of the context's transaction
pub(crate) fn write_tables(ctx: &mut TxContext) -> BitempoResult<&mut Tables> {
    ctx.tx_mut()?.tables_mut()
}
