//! Corporate actions: declared events that change a symbol's share count or identity.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorporateActionKind {
    Split,
    Spinoff,
    Acquisition,
    Dividend,
    Unknown,
}

impl fmt::Display for CorporateActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CorporateActionKind::Split => "Split",
            CorporateActionKind::Spinoff => "Spinoff",
            CorporateActionKind::Acquisition => "Acquisition",
            CorporateActionKind::Dividend => "Dividend",
            CorporateActionKind::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// One corporate action.
///
/// `ratio` is always new-for-old: a 2-for-1 split has ratio 2.0, so the
/// running product of ratios ordered by time converts a pre-event share
/// count into its post-event equivalent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorporateAction {
    pub symbol: Option<String>,
    pub timestamp: NaiveDateTime,
    pub kind: CorporateActionKind,
    pub ratio: Option<f64>,
    /// Symbol created or absorbed by the action.
    pub target: Option<String>,
    pub currency: String,
    pub description: String,
    pub quantity: Option<f64>,
    pub proceeds: Option<f64>,
    pub value: Option<f64>,
    pub realized_pnl: Option<f64>,
}

impl CorporateAction {
    pub fn is_split(&self) -> bool {
        self.kind == CorporateActionKind::Split
    }
}
