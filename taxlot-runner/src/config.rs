//! Run configuration loaded from TOML.
//!
//! ```toml
//! strategy = "fifo"
//! scope = "global"
//! trades_path = "data/trades.csv"
//! actions_path = "data/actions.csv"
//! renames_path = "data/renames.csv"
//! symbols_path = "data/symbols.csv"
//! output_dir = "out"
//! process_years = [2024]
//!
//! [taxable]
//! exempt_after_days = 1095
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use taxlot_core::{ConfigurationError, MatchScope, MatchStrategy};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Holding-period rule for the pairing report's `Taxable` column.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaxableConfig {
    /// Pairs held longer than this many days are reported as not taxable.
    /// Unset means every pair is taxable.
    pub exempt_after_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// One of `fifo | lifo | average-cost | max-loss | max-profit`.
    pub strategy: String,
    /// `global` or `per_account`.
    pub scope: String,

    // ── Ledger files ──
    pub trades_path: Option<PathBuf>,
    pub actions_path: Option<PathBuf>,
    /// External rename history (`Old, New, Change Date, New Company Name`).
    pub renames_path: Option<PathBuf>,
    /// Persisted symbol table, manual overrides included.
    pub symbols_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,

    /// Statement account for adapter files without an `Account` column.
    pub default_account: Option<String>,

    /// Years reported in the pairing output; empty means all.
    pub process_years: Vec<i32>,

    pub taxable: TaxableConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::Fifo.to_string(),
            scope: MatchScope::Global.to_string(),
            trades_path: None,
            actions_path: None,
            renames_path: None,
            symbols_path: None,
            output_dir: None,
            default_account: None,
            process_years: Vec::new(),
            taxable: TaxableConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject unknown strategy or scope names.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.match_strategy()?;
        self.match_scope()?;
        Ok(())
    }

    pub fn match_strategy(&self) -> Result<MatchStrategy, ConfigurationError> {
        self.strategy.parse()
    }

    pub fn match_scope(&self) -> Result<MatchScope, ConfigurationError> {
        self.scope.parse()
    }

    /// The persisted trades file; every command needs it.
    pub fn require_trades_path(&self) -> Result<&Path, ConfigurationError> {
        self.trades_path
            .as_deref()
            .ok_or_else(|| ConfigurationError::MissingPath("trades_path".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = RunConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.match_strategy().unwrap(), MatchStrategy::Fifo);
        assert_eq!(c.match_scope().unwrap(), MatchScope::Global);
    }

    #[test]
    fn parses_full_file() {
        let c = RunConfig::from_toml(
            r#"
strategy = "max-loss"
scope = "per_account"
trades_path = "ledger/trades.csv"
process_years = [2023, 2024]

[taxable]
exempt_after_days = 1095
"#,
        )
        .unwrap();
        assert_eq!(c.match_strategy().unwrap(), MatchStrategy::MaxLoss);
        assert_eq!(c.match_scope().unwrap(), MatchScope::PerAccount);
        assert_eq!(c.require_trades_path().unwrap(), Path::new("ledger/trades.csv"));
        assert_eq!(c.process_years, vec![2023, 2024]);
        assert_eq!(c.taxable.exempt_after_days, Some(1095));
    }

    #[test]
    fn unknown_strategy_is_a_configuration_error() {
        let err = RunConfig::from_toml("strategy = \"Fifo\"").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Configuration(ConfigurationError::UnknownStrategy(ref s)) if s == "Fifo"
        ));
    }

    #[test]
    fn missing_path_is_reported_by_name() {
        let c = RunConfig::default();
        assert_eq!(
            c.require_trades_path(),
            Err(ConfigurationError::MissingPath("trades_path".into()))
        );
    }

    #[test]
    fn toml_roundtrip() {
        let mut c = RunConfig::default();
        c.strategy = "average-cost".into();
        c.output_dir = Some(PathBuf::from("out"));
        let back = RunConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }
}
