//! CSV persistence of the ledger and the pairing report.
//!
//! Ledger tables (reloadable):
//! - **trades.csv**: indexed by `Hash`, with both the original and the
//!   split-adjusted quantity and price
//! - **actions.csv**: corporate actions with their parsed kind and ratio
//! - **symbols.csv**: the symbol table, manual overrides included
//!
//! Reports (output only):
//! - **pairs.csv** and **pairs.YEAR.csv**: realized pairs with a `Taxable`
//!   column
//! - **unpaired.csv**: closes with uncovered quantity
//! - **remaining.csv**: lots still open after the last close
//! - **result.json**: the full match result

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDateTime};
use taxlot_core::domain::{CorporateAction, TIMESTAMP_FORMAT};
use taxlot_core::matching::MatchResult;
use taxlot_core::normalize::NormalizeOptions;
use taxlot_core::renames::SymbolTable;
use taxlot_core::{recompute, Ledger, Pair};

use crate::import::{import_file, load_actions_file, load_symbols_file};
use crate::tax::TaxPolicy;

fn num(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn time(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn flag(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Ledger tables ──────────────────────────────────────────────────

/// Export trades in chronological order.
///
/// Numbers are written at full precision so a reload reproduces every hash.
pub fn export_trades_csv(ledger: &Ledger) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "Hash",
        "Symbol",
        "Display Suffix",
        "Ticker",
        "Account",
        "Date/Time",
        "Quantity",
        "Orig. Quantity",
        "T. Price",
        "Orig. T. Price",
        "Currency",
        "Proceeds",
        "Comm/Fee",
        "Basis",
        "Realized P/L",
        "Action",
        "Type",
        "Target",
        "Manual",
        "Split Ratio",
        "Accumulated Quantity",
        "Account Accumulated Quantity",
    ])?;

    for t in ledger.trades_chronological() {
        wtr.write_record([
            t.hash.as_str(),
            &t.raw_symbol,
            &t.display_suffix,
            &t.ticker,
            &t.account,
            &time(t.timestamp),
            &num(t.quantity),
            &num(t.orig_quantity),
            &num(t.price),
            &num(t.orig_price),
            &t.currency,
            &num(t.proceeds),
            &num(t.commission),
            &num(t.basis),
            &num(t.realized_pnl),
            t.action.as_str(),
            t.trade_type.map(|ty| ty.as_str()).unwrap_or_default(),
            t.target.as_deref().unwrap_or_default(),
            flag(t.manual),
            &t.split_ratio.to_string(),
            &t.accumulated_quantity.to_string(),
            &t.account_accumulated_quantity.to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn export_actions_csv(actions: &[CorporateAction]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "Symbol",
        "Date/Time",
        "Action",
        "Ratio",
        "Target",
        "Currency",
        "Description",
        "Quantity",
        "Proceeds",
        "Value",
        "Realized P/L",
    ])?;
    for a in actions {
        wtr.write_record([
            a.symbol.as_deref().unwrap_or_default(),
            &time(a.timestamp),
            &a.kind.to_string(),
            &num(a.ratio),
            a.target.as_deref().unwrap_or_default(),
            &a.currency,
            &a.description,
            &num(a.quantity),
            &num(a.proceeds),
            &num(a.value),
            &num(a.realized_pnl),
        ])?;
    }
    finish(wtr)
}

pub fn export_symbols_csv(symbols: &SymbolTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["Symbol", "Ticker", "Change Date", "Currency", "Manual"])?;
    for r in symbols.rows() {
        wtr.write_record([
            r.symbol.as_str(),
            &r.ticker,
            &r.change_date.map(time).unwrap_or_default(),
            r.currency.as_deref().unwrap_or_default(),
            flag(r.manual),
        ])?;
    }
    finish(wtr)
}

/// Where the ledger tables live. Tables without a path are not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerPaths {
    pub trades: PathBuf,
    pub actions: Option<PathBuf>,
    pub symbols: Option<PathBuf>,
}

impl LedgerPaths {
    pub fn new(trades: impl Into<PathBuf>) -> Self {
        Self {
            trades: trades.into(),
            actions: None,
            symbols: None,
        }
    }

    /// All tables side by side in one directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            trades: dir.join("trades.csv"),
            actions: Some(dir.join("actions.csv")),
            symbols: Some(dir.join("symbols.csv")),
        }
    }
}

fn write(path: &Path, content: String) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Write the ledger tables, creating parent directories as needed.
pub fn save_ledger(ledger: &Ledger, paths: &LedgerPaths) -> Result<()> {
    write(&paths.trades, export_trades_csv(ledger)?)?;
    if let Some(path) = &paths.actions {
        write(path, export_actions_csv(&ledger.actions)?)?;
    }
    if let Some(path) = &paths.symbols {
        write(path, export_symbols_csv(&ledger.symbols)?)?;
    }
    tracing::info!(trades_file = %paths.trades.display(), trades = ledger.len(), "saved ledger");
    Ok(())
}

/// Load ledger tables written by [`save_ledger`] and recompute derived fields.
///
/// The trades table is required; optional tables that do not exist on disk
/// are left empty.
pub fn load_ledger(paths: &LedgerPaths, opts: &NormalizeOptions) -> Result<Ledger> {
    let trades = import_file(&paths.trades, opts)
        .with_context(|| format!("failed to load {}", paths.trades.display()))?;
    let mut ledger = Ledger::from_trades(trades);

    if let Some(path) = paths.actions.as_deref().filter(|p| p.exists()) {
        ledger.actions = load_actions_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }
    if let Some(path) = paths.symbols.as_deref().filter(|p| p.exists()) {
        ledger.symbols = load_symbols_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }
    Ok(recompute(&ledger))
}

// ─── Pairing report ─────────────────────────────────────────────────

/// Export realized pairs in buy/sell view with the policy's taxable flag.
pub fn export_pairs_csv<'a>(
    pairs: impl IntoIterator<Item = &'a Pair>,
    policy: &dyn TaxPolicy,
) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "Symbol",
        "Account",
        "Side",
        "Buy Time",
        "Sell Time",
        "Quantity",
        "Buy Price",
        "Sell Price",
        "Proceeds",
        "Cost",
        "Commission",
        "Realized Gain",
        "Holding Days",
        "Taxable",
        "Strategy",
    ])?;
    for p in pairs {
        wtr.write_record([
            p.instrument.display_name().as_str(),
            &p.account,
            &format!("{:?}", p.side),
            &time(p.buy_time()),
            &time(p.sell_time()),
            &format!("{:.6}", p.matched_quantity),
            &format!("{:.6}", p.buy_price()),
            &format!("{:.6}", p.sell_price()),
            &format!("{:.3}", p.proceeds),
            &format!("{:.3}", p.cost_basis),
            &format!("{:.3}", p.allocated_commission),
            &format!("{:.3}", p.realized_gain),
            &p.holding_days().to_string(),
            if policy.taxable(p) { "1" } else { "0" },
            p.strategy.as_str(),
        ])?;
    }
    finish(wtr)
}

/// Closes the engine could not cover, optionally restricted to some years.
pub fn export_unpaired_csv(result: &MatchResult, years: &[i32]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "Hash",
        "Symbol",
        "Account",
        "Date/Time",
        "Quantity",
        "Covered Quantity",
        "Uncovered Quantity",
    ])?;
    for c in result
        .uncovered()
        .filter(|c| years.is_empty() || years.contains(&c.timestamp.year()))
    {
        wtr.write_record([
            c.trade.as_str(),
            c.instrument.display_name().as_str(),
            &c.account,
            &time(c.timestamp),
            &c.quantity.to_string(),
            &c.covered.to_string(),
            &c.uncovered.to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn export_remaining_csv(result: &MatchResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["Symbol", "Account", "Side", "Opened", "Quantity", "Price", "Open Trade"])?;
    for lot in &result.remaining_lots {
        wtr.write_record([
            lot.instrument.display_name().as_str(),
            lot.account.as_deref().unwrap_or_default(),
            &format!("{:?}", lot.side),
            &time(lot.opened_at),
            &lot.quantity.to_string(),
            &format!("{:.6}", lot.price),
            lot.open_trade.as_ref().map(|h| h.as_str()).unwrap_or_default(),
        ])?;
    }
    finish(wtr)
}

/// Serialize a match result to pretty JSON.
pub fn export_match_json(result: &MatchResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize MatchResult to JSON")
}

/// Deserialize a match result written by [`export_match_json`].
pub fn import_match_json(json: &str) -> Result<MatchResult> {
    serde_json::from_str(json).context("failed to deserialize MatchResult from JSON")
}

/// Write the pairing report into `output_dir`.
///
/// The match covers all history; `years` only filters what is written.
/// One `pairs.YEAR.csv` is written per reported close year. Returns the
/// paths written.
pub fn save_report(
    result: &MatchResult,
    policy: &dyn TaxPolicy,
    years: &[i32],
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir {}", output_dir.display()))?;
    let mut written = Vec::new();

    let path = output_dir.join("pairs.csv");
    write(&path, export_pairs_csv(result.pairs_closed_in(years), policy)?)?;
    written.push(path);

    let reported: BTreeSet<i32> = result
        .pairs_closed_in(years)
        .map(|p| p.close_time.year())
        .collect();
    for year in reported {
        let only = [year];
        let path = output_dir.join(format!("pairs.{year}.csv"));
        write(&path, export_pairs_csv(result.pairs_closed_in(&only), policy)?)?;
        written.push(path);
    }

    let path = output_dir.join("unpaired.csv");
    write(&path, export_unpaired_csv(result, years)?)?;
    written.push(path);

    let path = output_dir.join("remaining.csv");
    write(&path, export_remaining_csv(result)?)?;
    written.push(path);

    let path = output_dir.join("result.json");
    write(&path, export_match_json(result)?)?;
    written.push(path);

    tracing::info!(
        dir = %output_dir.display(),
        pairs = result.pairs.len(),
        strategy = %result.strategy,
        "saved pairing report"
    );
    Ok(written)
}
