//! Normalizer: converts adapter frames into canonical trades.
//!
//! Import adapters (one per broker format) are external; they hand over a
//! `RawFrame` of string columns. This module recognizes the layout, coerces
//! numbers, derives `Action`/`Type` where missing, and assigns every row its
//! content hash.
//!
//! Two layouts are recognized:
//! - **adapter**: `Symbol, Date/Time, Quantity, Currency, T. Price, Proceeds,
//!   Comm/Fee, Basis, Realized P/L` plus `Action` or `Code`
//! - **persisted**: the ledger's own CSV export, indexed by `Hash`, carrying
//!   `Orig. Quantity` / `Orig. T. Price` next to the adjusted values

use crate::domain::{Trade, TradeAction, TradeHash, TradeType};
use crate::error::{FormatError, MissingAccountError, NormalizeError};
use crate::fingerprint::trade_hash;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::io::Read;

/// Columns every adapter frame must carry.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "Symbol",
    "Date/Time",
    "Quantity",
    "Currency",
    "T. Price",
    "Proceeds",
    "Comm/Fee",
    "Basis",
    "Realized P/L",
];

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d, %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// A table of raw string cells as emitted by an import adapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawFrame {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Read a CSV frame. Rows whose width differs from the header are
    /// rejected as a shape error.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, FormatError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(FormatError::EmptyFrame);
        }

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() != headers.len() {
                return Err(FormatError::RowShape {
                    row: i + 1,
                    expected: headers.len(),
                    found: record.len(),
                });
            }
            rows.push(record.iter().map(|c| c.to_string()).collect());
        }
        Ok(Self { headers, rows })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn index(&self) -> HashMap<&str, usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect()
    }
}

/// Which known layout a frame matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLayout {
    Adapter,
    Persisted,
}

/// Recognize a frame's layout or report the columns it lacks.
pub fn detect_layout(frame: &RawFrame) -> Result<FrameLayout, FormatError> {
    if frame.headers.is_empty() {
        return Err(FormatError::EmptyFrame);
    }
    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !frame.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if !frame.has_column("Action") && !frame.has_column("Code") {
        missing.push("Action|Code".to_string());
    }
    if !missing.is_empty() {
        return Err(FormatError::MissingColumns { missing });
    }
    if frame.has_column("Hash") && frame.has_column("Orig. Quantity") {
        Ok(FrameLayout::Persisted)
    } else {
        Ok(FrameLayout::Adapter)
    }
}

/// Options supplied by the adapter alongside the frame.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Statement-level account used for rows without their own `Account`.
    pub default_account: Option<String>,
}

/// Coerce a numeric cell. Thousands separators are stripped; anything
/// unparsable becomes `None` rather than failing the row.
pub fn parse_number(cell: &str) -> Option<f64> {
    let cleaned: String = cell.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Parse a timestamp in any of the broker / export formats. Date-only cells
/// resolve to midnight.
pub fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    let cell = cell.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(cell, fmt) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_bool(cell: &str) -> bool {
    matches!(cell.trim(), "True" | "true" | "TRUE" | "1")
}

fn non_empty(cell: &str) -> Option<String> {
    let cell = cell.trim();
    if cell.is_empty() || cell == "nan" || cell == "None" {
        None
    } else {
        Some(cell.to_string())
    }
}

/// Normalize a frame into canonical trades.
///
/// Fails with `FormatError` when the layout is unknown or a timestamp cannot
/// be read, and with `MissingAccountError` when a row has no account and the
/// adapter supplied no default.
pub fn normalize_frame(
    frame: &RawFrame,
    opts: &NormalizeOptions,
) -> Result<Vec<Trade>, NormalizeError> {
    let layout = detect_layout(frame)?;
    let idx = frame.index();
    let cell = |row: &[String], name: &str| -> Option<String> {
        idx.get(name).and_then(|&i| row.get(i)).and_then(|c| non_empty(c))
    };

    let mut trades = Vec::with_capacity(frame.rows.len());
    for (i, row) in frame.rows.iter().enumerate() {
        let row_no = i + 1;
        let symbol = cell(row, "Symbol").unwrap_or_default();

        let raw_ts = cell(row, "Date/Time").unwrap_or_default();
        let timestamp =
            parse_timestamp(&raw_ts).ok_or_else(|| FormatError::InvalidTimestamp {
                row: row_no,
                value: raw_ts.clone(),
            })?;

        let account = cell(row, "Account")
            .or_else(|| opts.default_account.clone())
            .ok_or_else(|| MissingAccountError {
                row: row_no,
                symbol: symbol.clone(),
            })?;

        let action = match cell(row, "Action") {
            Some(a) => a.parse::<TradeAction>().unwrap_or(TradeAction::Unknown),
            None => cell(row, "Code")
                .map(|c| TradeAction::from_code(&c))
                .unwrap_or(TradeAction::Unknown),
        };

        let (orig_quantity, orig_price) = match layout {
            FrameLayout::Persisted => (
                cell(row, "Orig. Quantity").and_then(|c| parse_number(&c)),
                cell(row, "Orig. T. Price").and_then(|c| parse_number(&c)),
            ),
            FrameLayout::Adapter => (
                cell(row, "Quantity").and_then(|c| parse_number(&c)),
                cell(row, "T. Price").and_then(|c| parse_number(&c)),
            ),
        };

        let trade_type = cell(row, "Type").and_then(|t| t.parse::<TradeType>().ok());

        let trade = Trade {
            hash: TradeHash::from_hex(""),
            raw_symbol: symbol.clone(),
            display_suffix: cell(row, "Display Suffix").unwrap_or_default(),
            account,
            currency: cell(row, "Currency").unwrap_or_default(),
            timestamp,
            orig_quantity,
            orig_price,
            proceeds: cell(row, "Proceeds").and_then(|c| parse_number(&c)),
            commission: cell(row, "Comm/Fee").and_then(|c| parse_number(&c)),
            basis: cell(row, "Basis").and_then(|c| parse_number(&c)),
            realized_pnl: cell(row, "Realized P/L").and_then(|c| parse_number(&c)),
            action,
            trade_type,
            target: cell(row, "Target"),
            manual: cell(row, "Manual").map(|c| parse_bool(&c)).unwrap_or(false),
            ticker: cell(row, "Ticker").unwrap_or(symbol),
            quantity: None,
            price: None,
            split_ratio: 1.0,
            accumulated_quantity: 0.0,
            account_accumulated_quantity: 0.0,
        };
        trades.push(finalize_trade(trade));
    }

    tracing::debug!(rows = trades.len(), ?layout, "normalized frame");
    Ok(trades)
}

/// Complete a trade built outside a frame: derive the type when absent,
/// reset derived values from the source values and assign the hash.
pub fn finalize_trade(mut trade: Trade) -> Trade {
    if trade.trade_type.is_none() {
        trade.trade_type = TradeType::derive(trade.action, trade.orig_quantity);
    }
    if trade.ticker.is_empty() {
        trade.ticker = trade.raw_symbol.clone();
    }
    trade.reset_derived();
    trade.hash = trade_hash(&trade);
    trade
}
