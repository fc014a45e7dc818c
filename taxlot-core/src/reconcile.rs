//! Position reconciliation and data-quality detectors.
//!
//! - `compute_accumulated_positions`: running position per instrument and
//!   per (account, instrument), recomputed over the whole history.
//! - Detectors are read-only queries over reconciled trades. Their findings
//!   are `DataQualityWarning`s, never errors.

use crate::domain::{InstrumentKey, Trade, TradeAction, TradeHash, TradeType, QUANTITY_EPSILON};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Sort trades chronologically and fill both accumulated quantities.
///
/// Ties on timestamp are broken by hash so the result does not depend on
/// input order.
pub fn compute_accumulated_positions(trades: &mut [Trade]) {
    trades.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.hash.cmp(&b.hash)));

    let mut by_instrument: HashMap<InstrumentKey, f64> = HashMap::new();
    let mut by_account: HashMap<(String, InstrumentKey), f64> = HashMap::new();
    for trade in trades.iter_mut() {
        let key = trade.instrument();
        let q = trade.qty();

        let total = by_instrument.entry(key.clone()).or_insert(0.0);
        *total += q;
        trade.accumulated_quantity = *total;

        let account_total = by_account.entry((trade.account.clone(), key)).or_insert(0.0);
        *account_total += q;
        trade.account_accumulated_quantity = *account_total;
    }
}

/// A non-fatal finding about the reconciled ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataQualityWarning {
    /// A close left the position on the wrong side of zero; an earlier
    /// open is probably missing from the imports.
    ImpossibleClose {
        trade: TradeHash,
        instrument: String,
        timestamp: NaiveDateTime,
        trade_type: TradeType,
        accumulated_quantity: f64,
    },
    /// Transfers between two accounts that do not net out for an instrument.
    UnmatchedTransfer {
        instrument: String,
        account: String,
        residual: f64,
    },
    /// An account sent shares it never held.
    TransferDeficit {
        trade: TradeHash,
        instrument: String,
        account: String,
        timestamp: NaiveDateTime,
        account_accumulated_quantity: f64,
    },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::ImpossibleClose {
                instrument,
                timestamp,
                trade_type,
                accumulated_quantity,
                ..
            } => write!(
                f,
                "{instrument}: {trade_type} close at {timestamp} leaves {accumulated_quantity}"
            ),
            DataQualityWarning::UnmatchedTransfer {
                instrument,
                account,
                residual,
            } => write!(
                f,
                "{instrument}: transfers into {account} do not net out (residual {residual})"
            ),
            DataQualityWarning::TransferDeficit {
                instrument,
                account,
                timestamp,
                account_accumulated_quantity: left,
                ..
            } => write!(
                f,
                "{instrument}: {account} transferred out at {timestamp} leaving {left}"
            ),
        }
    }
}

/// Closes that leave a long position negative or a short position positive.
pub fn impossible_closes(trades: &[Trade]) -> Vec<DataQualityWarning> {
    trades
        .iter()
        .filter(|t| t.action == TradeAction::Close)
        .filter_map(|t| {
            let trade_type = t.trade_type?;
            let acc = t.accumulated_quantity;
            let impossible = match trade_type {
                TradeType::Long => acc < -QUANTITY_EPSILON,
                TradeType::Short => acc > QUANTITY_EPSILON,
                _ => false,
            };
            impossible.then(|| DataQualityWarning::ImpossibleClose {
                trade: t.hash.clone(),
                instrument: t.display_name(),
                timestamp: t.timestamp,
                trade_type,
                accumulated_quantity: acc,
            })
        })
        .collect()
}

/// Groups of cross-account transfers with a non-zero residual.
///
/// Outgoing transfers are keyed by (instrument, target account) and
/// incoming transfers by (instrument, receiving account); a group whose
/// quantities do not sum to zero is reported. Spin-off and acquisition
/// transfers, and transfers without a counter-account, are not considered.
pub fn unmatched_transfers(trades: &[Trade]) -> Vec<DataQualityWarning> {
    let mut groups: BTreeMap<(String, String), f64> = BTreeMap::new();
    for t in trades.iter().filter(|t| t.action == TradeAction::Transfer) {
        let Some(target) = t.target.as_deref().filter(|s| !s.is_empty()) else {
            continue;
        };
        let receiver = match t.trade_type {
            Some(TradeType::Out) => target,
            Some(TradeType::In) => t.account.as_str(),
            _ => continue,
        };
        *groups
            .entry((t.display_name(), receiver.to_string()))
            .or_insert(0.0) += t.qty();
    }
    groups
        .into_iter()
        .filter(|(_, residual)| residual.abs() > QUANTITY_EPSILON)
        .map(|((instrument, account), residual)| DataQualityWarning::UnmatchedTransfer {
            instrument,
            account,
            residual,
        })
        .collect()
}

/// Outgoing transfers that leave the sending account short.
pub fn transfer_deficits(trades: &[Trade]) -> Vec<DataQualityWarning> {
    trades
        .iter()
        .filter(|t| t.action == TradeAction::Transfer && t.trade_type == Some(TradeType::Out))
        .filter(|t| t.account_accumulated_quantity < -QUANTITY_EPSILON)
        .map(|t| DataQualityWarning::TransferDeficit {
            trade: t.hash.clone(),
            instrument: t.display_name(),
            account: t.account.clone(),
            timestamp: t.timestamp,
            account_accumulated_quantity: t.account_accumulated_quantity,
        })
        .collect()
}

/// Run every detector and log each finding.
pub fn check(trades: &[Trade]) -> Vec<DataQualityWarning> {
    let mut warnings = impossible_closes(trades);
    warnings.extend(unmatched_transfers(trades));
    warnings.extend(transfer_deficits(trades));
    for w in &warnings {
        tracing::warn!(finding = %w, "data quality");
    }
    warnings
}
