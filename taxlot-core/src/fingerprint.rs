//! Trade fingerprinting: deterministic identity of a brokerage event.
//!
//! - `TradeFingerprint`: the immutable source fields of a trade.
//! - `TradeFingerprint::hash()`: BLAKE3 over a canonical encoding of them.
//!
//! Derived fields (split-adjusted quantity, accumulated positions, canonical
//! ticker) never take part, so a trade keeps its identity across recompute
//! passes and re-imports of overlapping statements collapse to one row.

use crate::domain::{Trade, TradeAction, TradeHash, TradeType, TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;

/// Separator between encoded fields (ASCII unit separator).
const FIELD_SEP: &[u8] = &[0x1f];

/// Borrowed view of the fields that define a trade's identity.
#[derive(Debug, Clone, Copy)]
pub struct TradeFingerprint<'a> {
    pub raw_symbol: &'a str,
    pub display_suffix: &'a str,
    pub account: &'a str,
    pub currency: &'a str,
    pub timestamp: NaiveDateTime,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub proceeds: Option<f64>,
    pub commission: Option<f64>,
    pub basis: Option<f64>,
    pub realized_pnl: Option<f64>,
    pub action: TradeAction,
    pub trade_type: Option<TradeType>,
    pub target: Option<&'a str>,
    pub manual: bool,
}

impl<'a> TradeFingerprint<'a> {
    pub fn of(trade: &'a Trade) -> Self {
        Self {
            raw_symbol: &trade.raw_symbol,
            display_suffix: &trade.display_suffix,
            account: &trade.account,
            currency: &trade.currency,
            timestamp: trade.timestamp,
            quantity: trade.orig_quantity,
            price: trade.orig_price,
            proceeds: trade.proceeds,
            commission: trade.commission,
            basis: trade.basis,
            realized_pnl: trade.realized_pnl,
            action: trade.action,
            trade_type: trade.trade_type,
            target: trade.target.as_deref(),
            manual: trade.manual,
        }
    }

    /// Content hash, stable across runs, platforms and file ordering.
    pub fn hash(&self) -> TradeHash {
        let mut hasher = blake3::Hasher::new();
        let timestamp = self.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let fields: [&str; 5] = [
            self.raw_symbol,
            self.display_suffix,
            self.account,
            self.currency,
            &timestamp,
        ];
        for field in fields {
            hasher.update(field.as_bytes());
            hasher.update(FIELD_SEP);
        }
        for value in [
            self.quantity,
            self.price,
            self.proceeds,
            self.commission,
            self.basis,
            self.realized_pnl,
        ] {
            hasher.update(encode_number(value).as_bytes());
            hasher.update(FIELD_SEP);
        }
        hasher.update(self.action.as_str().as_bytes());
        hasher.update(FIELD_SEP);
        hasher.update(self.trade_type.map(|t| t.as_str()).unwrap_or("").as_bytes());
        hasher.update(FIELD_SEP);
        hasher.update(self.target.unwrap_or("").as_bytes());
        hasher.update(FIELD_SEP);
        hasher.update(if self.manual { b"1" } else { b"0" });
        TradeHash(hasher.finalize().to_hex().to_string())
    }
}

/// Shortest round-trip representation; missing values encode as empty.
///
/// `-0.0` is folded into `0.0` so a sign-only difference never splits one
/// event into two identities.
fn encode_number(value: Option<f64>) -> String {
    match value {
        None => String::new(),
        Some(v) if v.is_nan() => String::new(),
        Some(v) if v == 0.0 => "0".to_string(),
        Some(v) => format!("{v:?}"),
    }
}

/// Hash a trade from its source fields.
pub fn trade_hash(trade: &Trade) -> TradeHash {
    TradeFingerprint::of(trade).hash()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_trade() -> Trade {
        Trade {
            hash: TradeHash::from_hex(""),
            raw_symbol: "CEZ".into(),
            display_suffix: String::new(),
            account: "U1234567".into(),
            currency: "CZK".into(),
            timestamp: NaiveDate::from_ymd_opt(2023, 8, 3)
                .unwrap()
                .and_hms_opt(8, 44, 3)
                .unwrap(),
            orig_quantity: Some(250.0),
            orig_price: Some(954.0),
            proceeds: Some(-238500.0),
            commission: Some(-763.2),
            basis: Some(239263.2),
            realized_pnl: Some(0.0),
            action: TradeAction::Open,
            trade_type: Some(TradeType::Long),
            target: None,
            manual: false,
            ticker: "CEZ".into(),
            quantity: Some(250.0),
            price: Some(954.0),
            split_ratio: 1.0,
            accumulated_quantity: 0.0,
            account_accumulated_quantity: 0.0,
        }
    }

    #[test]
    fn hashing_is_deterministic() {
        let t = sample_trade();
        assert_eq!(trade_hash(&t), trade_hash(&t.clone()));
        assert_eq!(trade_hash(&t).as_str().len(), 64);
    }

    #[test]
    fn derived_fields_do_not_affect_hash() {
        let t1 = sample_trade();
        let mut t2 = sample_trade();
        t2.ticker = "CEZ.PR".into();
        t2.quantity = Some(500.0);
        t2.price = Some(477.0);
        t2.split_ratio = 2.0;
        t2.accumulated_quantity = 750.0;
        t2.account_accumulated_quantity = 750.0;
        assert_eq!(trade_hash(&t1), trade_hash(&t2));
    }

    #[test]
    fn source_fields_affect_hash() {
        let t1 = sample_trade();
        let mut t2 = sample_trade();
        t2.orig_quantity = Some(251.0);
        assert_ne!(trade_hash(&t1), trade_hash(&t2));

        let mut t3 = sample_trade();
        t3.commission = None;
        assert_ne!(trade_hash(&t1), trade_hash(&t3));

        let mut t4 = sample_trade();
        t4.account = "U7654321".into();
        assert_ne!(trade_hash(&t1), trade_hash(&t4));
    }

    #[test]
    fn negative_zero_collapses() {
        let t1 = sample_trade();
        let mut t2 = sample_trade();
        t2.realized_pnl = Some(-0.0);
        assert_eq!(trade_hash(&t1), trade_hash(&t2));
    }

    #[test]
    fn adjacent_fields_do_not_alias() {
        let mut t1 = sample_trade();
        t1.raw_symbol = "AB".into();
        t1.display_suffix = "C".into();
        let mut t2 = sample_trade();
        t2.raw_symbol = "A".into();
        t2.display_suffix = "BC".into();
        assert_ne!(trade_hash(&t1), trade_hash(&t2));
    }
}
