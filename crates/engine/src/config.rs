//! Engine configuration via `bitempo.toml`
//!
//! Every section and field is optional; missing values take their defaults.
//! Values are kept as written and parsed on [`EngineConfig::validate`], so a
//! config file with a misspelled isolation level fails with a message naming
//! the offending value.

use std::path::Path;

use bitempo_concurrency::{DeferrableMode, IsolationLevel, TxOptions};
use bitempo_core::{BitempoError, BitempoResult};
use serde::{Deserialize, Serialize};

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "bitempo.toml";

/// Default number of queue entries delivered per `get_since_last_run`
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// `[transaction]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// `serializable`, `repeatable-read`, `read-committed` or `read-uncommitted`
    #[serde(default = "default_isolation_level")]
    pub isolation_level: String,
    /// `deferrable` or `not-deferrable`
    #[serde(default = "default_deferrable_mode")]
    pub deferrable_mode: String,
}

fn default_isolation_level() -> String {
    IsolationLevel::default().as_str().to_string()
}

fn default_deferrable_mode() -> String {
    DeferrableMode::default().as_str().to_string()
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            isolation_level: default_isolation_level(),
            deferrable_mode: default_deferrable_mode(),
        }
    }
}

/// `[projection]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Entries delivered per `get_since_last_run`; 0 means unbounded
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Engine configuration loaded from `bitempo.toml`.
///
/// # Example
///
/// ```toml
/// [transaction]
/// isolation_level = "read-committed"
///
/// [projection]
/// chunk_size = 0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default transaction options
    #[serde(default)]
    pub transaction: TransactionConfig,
    /// Projection queue behaviour
    #[serde(default)]
    pub projection: ProjectionConfig,
}

impl EngineConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> BitempoResult<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| BitempoError::config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn from_file(path: &Path) -> BitempoResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BitempoError::config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            BitempoError::Config { message } => {
                BitempoError::config(format!("{} ({})", message, path.display()))
            }
            other => other,
        })
    }

    /// Serialize to TOML and write it to `path`
    pub fn write_to_file(&self, path: &Path) -> BitempoResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BitempoError::config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            BitempoError::storage_with_source(
                format!("failed to write config file '{}'", path.display()),
                e,
            )
        })
    }

    /// The default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# bitempo engine configuration

[transaction]
# serializable (default) | repeatable-read | read-committed | read-uncommitted
# Recorded on every transaction; the in-memory engine always isolates fully.
isolation_level = "serializable"
# deferrable | not-deferrable (default)
deferrable_mode = "not-deferrable"

[projection]
# Queue entries delivered per get_since_last_run call; 0 delivers everything due.
chunk_size = 100
"#
    }

    /// Check that every value parses
    pub fn validate(&self) -> BitempoResult<()> {
        self.tx_options().map(|_| ())
    }

    /// Default transaction options described by this config
    pub fn tx_options(&self) -> BitempoResult<TxOptions> {
        let isolation_level: IsolationLevel = self.transaction.isolation_level.parse()?;
        let deferrable_mode: DeferrableMode = self.transaction.deferrable_mode.parse()?;
        Ok(TxOptions::new()
            .with_isolation_level(isolation_level)
            .with_deferrable_mode(deferrable_mode))
    }
}
