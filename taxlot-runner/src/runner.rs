//! Run orchestration: configured files in, ledger and pairing report out.

use std::path::{Path, PathBuf};

use taxlot_core::matching::MatchResult;
use taxlot_core::normalize::NormalizeOptions;
use taxlot_core::{ConfigurationError, DataQualityWarning, Ledger};
use thiserror::Error;

use crate::config::RunConfig;
use crate::export::{load_ledger, save_ledger, save_report, LedgerPaths};
use crate::import::{import_files, load_rename_history_file, ImportError, ImportReport};
use crate::tax::HoldingPeriodPolicy;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigurationError),
    #[error("import error: {0}")]
    Import(#[from] ImportError),
    #[error("trades file {0} does not exist; import statements first")]
    NoLedger(PathBuf),
    #[error(transparent)]
    Output(#[from] anyhow::Error),
}

pub fn ledger_paths(config: &RunConfig) -> Result<LedgerPaths, ConfigurationError> {
    Ok(LedgerPaths {
        trades: config.require_trades_path()?.to_path_buf(),
        actions: config.actions_path.clone(),
        symbols: config.symbols_path.clone(),
    })
}

pub fn normalize_options(config: &RunConfig) -> NormalizeOptions {
    NormalizeOptions {
        default_account: config.default_account.clone(),
    }
}

/// Load the configured ledger and fold in the rename history.
///
/// A missing trades file is an error unless `allow_empty` is set, in which
/// case the ledger starts empty (first import).
pub fn open_ledger(config: &RunConfig, allow_empty: bool) -> Result<Ledger, RunError> {
    let paths = ledger_paths(config)?;
    let mut ledger = if paths.trades.exists() {
        load_ledger(&paths, &normalize_options(config))?
    } else if allow_empty {
        tracing::info!(trades_file = %paths.trades.display(), "starting a new ledger");
        Ledger::new()
    } else {
        return Err(RunError::NoLedger(paths.trades));
    };

    if let Some(path) = config.renames_path.as_deref().filter(|p| p.exists()) {
        let history = load_rename_history_file(path)?;
        let taken = ledger.apply_rename_history(&history);
        tracing::info!(rows = history.len(), taken, "applied rename history");
    }
    Ok(ledger)
}

/// Import statement files into the configured ledger and persist it.
pub fn import_statements<P: AsRef<Path>>(
    config: &RunConfig,
    files: &[P],
) -> Result<(Ledger, ImportReport), RunError> {
    let mut ledger = open_ledger(config, true)?;
    let report = import_files(&mut ledger, files, &normalize_options(config));
    save_ledger(&ledger, &ledger_paths(config)?)?;
    Ok((ledger, report))
}

/// Outcome of a matching run.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub result: MatchResult,
    pub warnings: Vec<DataQualityWarning>,
    /// Report files written; empty without an `output_dir`.
    pub written: Vec<PathBuf>,
}

impl MatchOutcome {
    /// Realized gain of the pairs closed in `years` (all years when empty).
    pub fn realized_in(&self, years: &[i32]) -> f64 {
        self.result
            .pairs_closed_in(years)
            .map(|p| p.realized_gain)
            .sum()
    }
}

/// Match the configured ledger and write the pairing report.
pub fn run_match(config: &RunConfig) -> Result<MatchOutcome, RunError> {
    let strategy = config.match_strategy()?;
    let scope = config.match_scope()?;
    let mut ledger = open_ledger(config, false)?;

    let warnings = ledger.check();
    let result = ledger.pairs(strategy, scope);
    tracing::info!(
        %strategy,
        %scope,
        pairs = result.pairs.len(),
        uncovered = result.uncovered().count(),
        "matched ledger"
    );

    let written = match &config.output_dir {
        Some(dir) => {
            let policy = HoldingPeriodPolicy::from_config(&config.taxable);
            save_report(&result, &policy, &config.process_years, dir)?
        }
        None => Vec::new(),
    };

    Ok(MatchOutcome {
        result,
        warnings,
        written,
    })
}

/// Run the data-quality detectors over the configured ledger.
pub fn run_check(config: &RunConfig) -> Result<Vec<DataQualityWarning>, RunError> {
    Ok(open_ledger(config, false)?.check())
}
