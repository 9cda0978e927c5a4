//! Transaction options
//!
//! Isolation level and deferrable mode are accepted for every transaction and
//! handed to the transactor's [`TxConfigurer`](crate::TxConfigurer). The
//! in-memory engine records them and otherwise ignores them; a relational
//! backend would translate them into its own `SET TRANSACTION` directives.

use bitempo_core::BitempoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationLevel {
    /// Serializable
    #[default]
    Serializable,
    /// Repeatable read
    RepeatableRead,
    /// Read committed
    ReadCommitted,
    /// Read uncommitted
    ReadUncommitted,
}

impl IsolationLevel {
    /// Stable string form, as written in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::Serializable => "serializable",
            IsolationLevel::RepeatableRead => "repeatable-read",
            IsolationLevel::ReadCommitted => "read-committed",
            IsolationLevel::ReadUncommitted => "read-uncommitted",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationLevel {
    type Err = BitempoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serializable" => Ok(IsolationLevel::Serializable),
            "repeatable-read" => Ok(IsolationLevel::RepeatableRead),
            "read-committed" => Ok(IsolationLevel::ReadCommitted),
            "read-uncommitted" => Ok(IsolationLevel::ReadUncommitted),
            other => Err(BitempoError::config(format!(
                "unknown isolation level '{}'",
                other
            ))),
        }
    }
}

/// Deferrable mode of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeferrableMode {
    /// Deferrable
    Deferrable,
    /// Not deferrable
    #[default]
    NotDeferrable,
}

impl DeferrableMode {
    /// Stable string form, as written in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            DeferrableMode::Deferrable => "deferrable",
            DeferrableMode::NotDeferrable => "not-deferrable",
        }
    }
}

impl fmt::Display for DeferrableMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeferrableMode {
    type Err = BitempoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deferrable" => Ok(DeferrableMode::Deferrable),
            "not-deferrable" => Ok(DeferrableMode::NotDeferrable),
            other => Err(BitempoError::config(format!(
                "unknown deferrable mode '{}'",
                other
            ))),
        }
    }
}

/// Options applied when a transaction begins
///
/// # Example
/// ```
/// use bitempo_concurrency::{DeferrableMode, IsolationLevel, TxOptions};
///
/// let options = TxOptions::new()
///     .with_isolation_level(IsolationLevel::RepeatableRead)
///     .with_deferrable_mode(DeferrableMode::Deferrable);
/// assert_eq!(options.isolation_level, IsolationLevel::RepeatableRead);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxOptions {
    /// Isolation level
    #[serde(default)]
    pub isolation_level: IsolationLevel,
    /// Deferrable mode
    #[serde(default)]
    pub deferrable_mode: DeferrableMode,
}

impl TxOptions {
    /// Default options: serializable, not deferrable
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the isolation level
    pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    /// Set the deferrable mode
    pub fn with_deferrable_mode(mut self, mode: DeferrableMode) -> Self {
        self.deferrable_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_parse() {
        for level in [
            IsolationLevel::Serializable,
            IsolationLevel::RepeatableRead,
            IsolationLevel::ReadCommitted,
            IsolationLevel::ReadUncommitted,
        ] {
            assert_eq!(level.as_str().parse::<IsolationLevel>().unwrap(), level);
        }
        assert!("snapshot".parse::<IsolationLevel>().is_err());
    }

    #[test]
    fn test_deferrable_mode_parse() {
        assert_eq!(
            "deferrable".parse::<DeferrableMode>().unwrap(),
            DeferrableMode::Deferrable
        );
        assert!("maybe".parse::<DeferrableMode>().is_err());
    }

    #[test]
    fn test_options_compose() {
        let options = TxOptions::new().with_isolation_level(IsolationLevel::ReadCommitted);
        assert_eq!(options.isolation_level, IsolationLevel::ReadCommitted);
        assert_eq!(options.deferrable_mode, DeferrableMode::NotDeferrable);
    }
}
