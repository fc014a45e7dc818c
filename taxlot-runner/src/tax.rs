//! Taxable classification of realized pairs.
//!
//! Matching never decides taxability; the pairing report asks a
//! [`TaxPolicy`] per pair and prints the answer in its `Taxable` column.

use crate::config::TaxableConfig;
use taxlot_core::Pair;

pub trait TaxPolicy: Send + Sync {
    fn taxable(&self, pair: &Pair) -> bool;

    fn name(&self) -> &str;
}

/// Exempts pairs held longer than a fixed number of days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoldingPeriodPolicy {
    pub exempt_after_days: Option<i64>,
}

impl HoldingPeriodPolicy {
    pub fn new(exempt_after_days: Option<i64>) -> Self {
        Self { exempt_after_days }
    }

    pub fn from_config(config: &TaxableConfig) -> Self {
        Self::new(config.exempt_after_days)
    }
}

impl TaxPolicy for HoldingPeriodPolicy {
    fn taxable(&self, pair: &Pair) -> bool {
        match self.exempt_after_days {
            Some(days) => pair.holding_days() <= days,
            None => true,
        }
    }

    fn name(&self) -> &str {
        "holding-period"
    }
}
