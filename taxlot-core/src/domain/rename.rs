use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Maps a raw broker symbol to its canonical ticker.
///
/// A row with `change_date = Some(d)` covers trades dated at or before `d`.
/// A row with no change date is the original name and applies when nothing
/// more specific matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRename {
    pub symbol: String,
    pub ticker: String,
    pub change_date: Option<NaiveDateTime>,
    pub currency: Option<String>,
    pub manual: bool,
}

impl SymbolRename {
    /// Identity row: the symbol maps to itself with no change date.
    pub fn identity(symbol: impl Into<String>, currency: Option<String>) -> Self {
        let symbol = symbol.into();
        Self {
            ticker: symbol.clone(),
            symbol,
            change_date: None,
            currency,
            manual: false,
        }
    }

    /// Whether this row is eligible for a row dated `at`.
    pub fn covers(&self, at: NaiveDateTime) -> bool {
        match self.change_date {
            None => true,
            Some(d) => d >= at,
        }
    }

    /// Key used for manual-over-automatic precedence.
    pub fn key(&self) -> (&str, Option<NaiveDateTime>) {
        (self.symbol.as_str(), self.change_date)
    }
}

/// One row of an external rename-history source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameHistoryRow {
    pub old: String,
    pub new: String,
    pub change_date: NaiveDateTime,
}
