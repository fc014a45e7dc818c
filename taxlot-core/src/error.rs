//! Error taxonomy for ledger operations.
//!
//! Per-file problems (`FormatError`, `MissingAccountError`) are reported and
//! the remaining files keep importing. `ConfigurationError` is fatal at
//! startup. Data-quality findings are not errors at all; see
//! [`crate::reconcile::DataQualityWarning`].

use thiserror::Error;

/// Unrecognized import layout or an unreadable required field.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormatError {
    #[error("frame has no header row")]
    EmptyFrame,

    #[error("unrecognized layout, missing columns: {}", missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("row {row}: unparsable timestamp '{value}'")]
    InvalidTimestamp { row: usize, value: String },

    #[error("row {row}: expected {expected} fields, found {found}")]
    RowShape {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("csv error: {0}")]
    Csv(String),
}

impl From<csv::Error> for FormatError {
    fn from(e: csv::Error) -> Self {
        FormatError::Csv(e.to_string())
    }
}

/// A trade row without an account and no statement-level account to fill it.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("row {row}: no account for trade in '{symbol}' (accounts are required to match transfers)")]
pub struct MissingAccountError {
    pub row: usize,
    pub symbol: String,
}

/// Invalid run configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown matching strategy '{0}' (fifo, lifo, average-cost, max-loss, max-profit)")]
    UnknownStrategy(String),

    #[error("unknown matching scope '{0}' (global, per_account)")]
    UnknownScope(String),

    #[error("missing required path: {0}")]
    MissingPath(String),
}

/// Failure to normalize one adapter frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    MissingAccount(#[from] MissingAccountError),
}
