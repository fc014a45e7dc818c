//! Auxiliary ledger rows: position snapshots, dividends, import descriptors.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Broker-reported open position at the end of a statement period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub ticker: String,
    pub account: String,
    pub date: NaiveDate,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub split_ratio: f64,
}

impl PositionSnapshot {
    /// Snapshots describe the end of the day.
    pub fn as_of(&self) -> NaiveDateTime {
        self.date.and_hms_opt(23, 59, 59).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dividend {
    pub symbol: String,
    pub ticker: String,
    pub date: NaiveDate,
    pub amount: Option<f64>,
    pub currency: String,
    pub tax: Option<f64>,
    pub country: Option<String>,
}

/// Describes one imported statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub account: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub trade_count: usize,
}
