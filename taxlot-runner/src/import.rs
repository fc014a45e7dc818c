//! File import: adapter frames, persisted ledger tables and rename history.
//!
//! - [`import_files`] folds many statement files into a ledger; a bad file is
//!   reported in the [`ImportReport`] and the rest keep importing
//! - [`load_actions_csv`] reads corporate actions, either the ledger's own
//!   export or a broker report with only a `Description` column
//! - [`load_symbols_csv`] / [`load_rename_history_csv`] read the symbol table
//!   and the external rename history

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use taxlot_core::corporate_actions::parse_action_text;
use taxlot_core::domain::{
    CorporateAction, CorporateActionKind, RenameHistoryRow, SymbolRename, Trade,
};
use taxlot_core::normalize::{
    normalize_frame, parse_number, parse_timestamp, NormalizeOptions, RawFrame,
};
use taxlot_core::renames::SymbolTable;
use taxlot_core::{FormatError, Ledger, NormalizeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl From<FormatError> for ImportError {
    fn from(e: FormatError) -> Self {
        ImportError::Normalize(NormalizeError::Format(e))
    }
}

fn open(path: &Path) -> Result<File, ImportError> {
    File::open(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Trades ──────────────────────────────────────────────────────────

/// Normalize one trades file. Adapter and persisted layouts are both
/// accepted; the layout is recognized from the header.
pub fn import_file(path: &Path, opts: &NormalizeOptions) -> Result<Vec<Trade>, ImportError> {
    read_trades(open(path)?, opts)
}

pub fn read_trades<R: Read>(reader: R, opts: &NormalizeOptions) -> Result<Vec<Trade>, ImportError> {
    let frame = RawFrame::from_reader(reader)?;
    Ok(normalize_frame(&frame, opts)?)
}

/// Outcome of a multi-file import.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub files: usize,
    /// Trades read across all successful files.
    pub loaded: usize,
    /// Trades not already in the ledger.
    pub imported: usize,
    pub failed: Vec<(PathBuf, ImportError)>,
}

impl ImportReport {
    pub fn succeeded(&self) -> usize {
        self.files - self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Import every file into `ledger`, then recompute it once.
///
/// Files are merged one at a time in the order given, so the report's
/// `imported` count equals the growth of the ledger.
pub fn import_files<P: AsRef<Path>>(
    ledger: &mut Ledger,
    paths: &[P],
    opts: &NormalizeOptions,
) -> ImportReport {
    let mut report = ImportReport::default();
    for path in paths {
        let path = path.as_ref();
        report.files += 1;
        match import_file(path, opts) {
            Ok(trades) => {
                report.loaded += trades.len();
                let imported = ledger.merge_with(&Ledger::from_trades(trades));
                report.imported += imported;
                tracing::info!(file = %path.display(), imported, "imported statement");
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping file");
                report.failed.push((path.to_path_buf(), e));
            }
        }
    }
    *ledger = taxlot_core::recompute(ledger);
    report
}

// ── Corporate actions ───────────────────────────────────────────────

fn parse_kind(cell: &str) -> Option<CorporateActionKind> {
    match cell {
        "Split" => Some(CorporateActionKind::Split),
        "Spinoff" => Some(CorporateActionKind::Spinoff),
        "Acquisition" => Some(CorporateActionKind::Acquisition),
        "Dividend" => Some(CorporateActionKind::Dividend),
        "Unknown" => Some(CorporateActionKind::Unknown),
        _ => None,
    }
}

fn optional(cell: Option<&str>) -> Option<String> {
    cell.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string)
}

/// Column lookup for one record by header name.
struct Columns {
    headers: csv::StringRecord,
}

impl Columns {
    fn get<'r>(&self, record: &'r csv::StringRecord, name: &str) -> Option<&'r str> {
        self.headers
            .iter()
            .position(|h| h == name)
            .and_then(|i| record.get(i))
    }

    fn number(&self, record: &csv::StringRecord, name: &str) -> Option<f64> {
        self.get(record, name).and_then(parse_number)
    }

    fn timestamp(
        &self,
        record: &csv::StringRecord,
        name: &str,
        row: usize,
    ) -> Result<NaiveDateTime, FormatError> {
        let cell = self.get(record, name).unwrap_or_default();
        parse_timestamp(cell).ok_or_else(|| FormatError::InvalidTimestamp {
            row,
            value: cell.to_string(),
        })
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Read corporate actions.
///
/// Rows with a known `Action` keep their stored kind, ratio and target;
/// rows without one are classified from their `Description`.
pub fn load_actions_csv<R: Read>(reader: R) -> Result<Vec<CorporateAction>, ImportError> {
    let mut rdr = csv_reader(reader);
    let cols = Columns {
        headers: rdr.headers()?.clone(),
    };
    let mut actions = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let timestamp = cols.timestamp(&record, "Date/Time", i + 1)?;
        let description = cols.get(&record, "Description").unwrap_or_default().to_string();

        let stored = cols.get(&record, "Action").and_then(parse_kind);
        let (kind, symbol, ratio, target) = match stored {
            Some(kind) => (
                kind,
                optional(cols.get(&record, "Symbol")),
                cols.number(&record, "Ratio"),
                optional(cols.get(&record, "Target")),
            ),
            None => {
                let parsed = parse_action_text(&description);
                (parsed.kind, parsed.symbol, parsed.ratio, parsed.target)
            }
        };

        actions.push(CorporateAction {
            symbol,
            timestamp,
            kind,
            ratio,
            target,
            currency: cols.get(&record, "Currency").unwrap_or_default().to_string(),
            description,
            quantity: cols.number(&record, "Quantity"),
            proceeds: cols.number(&record, "Proceeds"),
            value: cols.number(&record, "Value"),
            realized_pnl: cols.number(&record, "Realized P/L"),
        });
    }
    tracing::debug!(actions = actions.len(), "loaded corporate actions");
    Ok(actions)
}

pub fn load_actions_file(path: &Path) -> Result<Vec<CorporateAction>, ImportError> {
    load_actions_csv(open(path)?)
}

// ── Symbols and renames ─────────────────────────────────────────────

fn parse_flag(cell: Option<&str>) -> bool {
    matches!(cell.map(str::trim), Some("True" | "true" | "TRUE" | "1"))
}

/// Read a persisted symbol table (`Symbol, Ticker, Change Date, Currency, Manual`).
pub fn load_symbols_csv<R: Read>(reader: R) -> Result<SymbolTable, ImportError> {
    let mut rdr = csv_reader(reader);
    let cols = Columns {
        headers: rdr.headers()?.clone(),
    };
    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let change_date = match optional(cols.get(&record, "Change Date")) {
            Some(_) => Some(cols.timestamp(&record, "Change Date", i + 1)?),
            None => None,
        };
        let symbol = cols.get(&record, "Symbol").unwrap_or_default().to_string();
        rows.push(SymbolRename {
            ticker: optional(cols.get(&record, "Ticker")).unwrap_or_else(|| symbol.clone()),
            symbol,
            change_date,
            currency: optional(cols.get(&record, "Currency")),
            manual: parse_flag(cols.get(&record, "Manual")),
        });
    }
    Ok(SymbolTable::new(rows))
}

pub fn load_symbols_file(path: &Path) -> Result<SymbolTable, ImportError> {
    load_symbols_csv(open(path)?)
}

/// Read an external rename history (`Old, New, Change Date, New Company Name`).
/// The company name is not kept.
pub fn load_rename_history_csv<R: Read>(reader: R) -> Result<Vec<RenameHistoryRow>, ImportError> {
    let mut rdr = csv_reader(reader);
    let cols = Columns {
        headers: rdr.headers()?.clone(),
    };
    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let (Some(old), Some(new)) = (
            optional(cols.get(&record, "Old")),
            optional(cols.get(&record, "New")),
        ) else {
            tracing::debug!(row = i + 1, "rename row without old/new symbol");
            continue;
        };
        rows.push(RenameHistoryRow {
            old,
            new,
            change_date: cols.timestamp(&record, "Change Date", i + 1)?,
        });
    }
    Ok(rows)
}

pub fn load_rename_history_file(path: &Path) -> Result<Vec<RenameHistoryRow>, ImportError> {
    load_rename_history_csv(open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_actions_are_classified_from_description() {
        let csv = "\
Currency,Report Date,Date/Time,Description,Quantity,Proceeds,Value,Realized P/L
USD,2024-06-10,\"2024-06-07, 20:25:00\",NVDA(US67066G1040) Split 10 for 1 (NVDA.OLD; NVIDIA CORP; US67066G1040),900,0,0,0
";
        let actions = load_actions_csv(csv.as_bytes()).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, CorporateActionKind::Split);
        assert_eq!(actions[0].symbol.as_deref(), Some("NVDA"));
        assert_eq!(actions[0].ratio, Some(10.0));
        assert_eq!(actions[0].quantity, Some(900.0));
    }

    #[test]
    fn stored_actions_keep_their_fields() {
        let csv = "\
Symbol,Date/Time,Action,Ratio,Target,Currency,Description,Quantity,Proceeds,Value,Realized P/L
SOLV,2024-04-01 00:00:00,Spinoff,0.25,,USD,spin,10,650,650,
";
        let actions = load_actions_csv(csv.as_bytes()).unwrap();
        assert_eq!(actions[0].kind, CorporateActionKind::Spinoff);
        assert_eq!(actions[0].ratio, Some(0.25));
        assert_eq!(actions[0].target, None);
        assert_eq!(actions[0].realized_pnl, None);
    }

    #[test]
    fn bad_action_timestamp_is_format_error() {
        let csv = "Date/Time,Description\nsoon,whatever\n";
        let err = load_actions_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Normalize(NormalizeError::Format(FormatError::InvalidTimestamp {
                row: 1,
                ..
            }))
        ));
    }

    #[test]
    fn rename_history_drops_company_name() {
        let csv = "\
Old,New,Change Date,New Company Name
FB,META,2022-06-09,Meta Platforms Inc
,XYZ,2022-01-01,Nothing
";
        let rows = load_rename_history_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].old, "FB");
        assert_eq!(rows[0].new, "META");
    }

    #[test]
    fn symbol_table_reads_null_dates() {
        let csv = "\
Symbol,Ticker,Change Date,Currency,Manual
FB,META,2022-06-09 00:00:00,USD,False
META,META,,USD,True
";
        let table = load_symbols_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.rows()[1].manual);
        assert_eq!(table.rows()[1].change_date, None);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = import_file(Path::new("/nonexistent/trades.csv"), &NormalizeOptions::default())
            .unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
    }
}
