//! Taxlot Runner: file import, ledger persistence and pairing reports.
//!
//! This crate builds on `taxlot-core` to provide:
//! - TOML run configuration
//! - Multi-file statement import with a per-file failure report
//! - CSV persistence of trades, corporate actions and the symbol table
//! - Pairing reports with a pluggable taxable policy
//! - A session store of named ledgers

pub mod config;
pub mod export;
pub mod import;
pub mod runner;
pub mod session;
pub mod tax;

pub use config::{ConfigError, RunConfig, TaxableConfig};
pub use export::{load_ledger, save_ledger, save_report, LedgerPaths};
pub use import::{import_file, import_files, ImportError, ImportReport};
pub use runner::{import_statements, open_ledger, run_check, run_match, MatchOutcome, RunError};
pub use session::SessionStore;
pub use tax::{HoldingPeriodPolicy, TaxPolicy};
