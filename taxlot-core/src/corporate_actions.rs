//! Corporate Action Processor.
//!
//! - `parse_action_text()`: classify a broker description (split, spin-off,
//!   acquisition, dividend). Unrecognized text degrades to `Unknown`.
//! - `adjust_for_splits()`: re-express every trade in current, post-split
//!   share terms. Derived strictly from `orig_*` fields, so re-running it on
//!   an unchanged action set is a no-op.
//! - `transfers_from_actions()`: synthetic trades for spin-offs and
//!   acquisitions, so share movements they cause enter the position history.

use crate::domain::{
    CorporateAction, CorporateActionKind, PositionSnapshot, Trade, TradeAction, TradeHash,
    TradeType,
};
use crate::normalize::finalize_trade;
use chrono::{Duration, NaiveDateTime};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Result of classifying an action description.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAction {
    pub kind: CorporateActionKind,
    pub symbol: Option<String>,
    pub ratio: Option<f64>,
    pub target: Option<String>,
}

impl ParsedAction {
    fn unknown(symbol: Option<String>) -> Self {
        Self {
            kind: CorporateActionKind::Unknown,
            symbol,
            ratio: None,
            target: None,
        }
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("constant pattern compiles"))
}

fn split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)([\w\.]+)\(\w+\) Split (\d+) for (\d+)")
}

fn spinoff_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)^(\w+)\(\w+\) Spinoff\s+(\d+) for (\d+) \((\w+),.+\)")
}

fn cash_acquisition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?i)^(\w+)\(\w+\) Merged\(Acquisition\) FOR (\w+) (\d+\.\d+) PER SHARE",
    )
}

fn stock_acquisition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?i)^(\w+)\(\w+\) Merged\(Acquisition\) WITH (\w+) (\d+) for (\d+) \((\w+),",
    )
}

fn symbol_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^(\w+)\(\w+\)")
}

fn ratio(new: &str, old: &str) -> Option<f64> {
    let new: f64 = new.parse().ok()?;
    let old: f64 = old.parse().ok()?;
    if old == 0.0 {
        None
    } else {
        Some(new / old)
    }
}

/// Classify a corporate-action description.
///
/// Examples:
/// - `AAPL(US0378331005) Split 4 for 1 (...)` → Split, ratio 4.0
/// - `GE(US3696043013) Spinoff  1 for 4 (GEHC, ...)` → Spinoff of GEHC, ratio 0.25
/// - `ATVI(US00507V1098) Merged(Acquisition) FOR USD 95.00 PER SHARE` → Acquisition, ratio 95.0
/// - `MRO(US5658491064) Merged(Acquisition) WITH US20825C1045 255 for 1000 (COP, ...)`
///   → Acquisition under COP, ratio 0.255, target MRO
pub fn parse_action_text(text: &str) -> ParsedAction {
    if let Some(c) = split_re().captures(text) {
        return ParsedAction {
            kind: CorporateActionKind::Split,
            symbol: Some(c[1].to_string()),
            ratio: ratio(&c[2], &c[3]),
            target: None,
        };
    }
    if let Some(c) = spinoff_re().captures(text) {
        return ParsedAction {
            kind: CorporateActionKind::Spinoff,
            symbol: Some(c[4].to_string()),
            ratio: ratio(&c[2], &c[3]),
            target: None,
        };
    }
    if let Some(c) = cash_acquisition_re().captures(text) {
        return ParsedAction {
            kind: CorporateActionKind::Acquisition,
            symbol: Some(c[1].to_string()),
            ratio: c[3].parse().ok(),
            target: None,
        };
    }
    if let Some(c) = stock_acquisition_re().captures(text) {
        return ParsedAction {
            kind: CorporateActionKind::Acquisition,
            symbol: Some(c[5].to_string()),
            ratio: ratio(&c[3], &c[4]),
            target: Some(c[1].to_string()),
        };
    }
    if let Some(c) = symbol_prefix_re().captures(text) {
        return ParsedAction::unknown(Some(c[1].to_string()));
    }
    if text.contains("Dividend") {
        return ParsedAction {
            kind: CorporateActionKind::Dividend,
            symbol: None,
            ratio: None,
            target: None,
        };
    }
    ParsedAction::unknown(None)
}

/// Per-ticker split schedule: `(timestamp, cumulative product)` ascending.
#[derive(Debug, Default)]
pub struct SplitSchedule {
    by_ticker: HashMap<String, Vec<(NaiveDateTime, f64)>>,
}

impl SplitSchedule {
    /// Build from the split actions in `actions`. `canonical` maps an
    /// action's symbol at its date to the ticker trades are grouped under.
    pub fn build<F>(actions: &[CorporateAction], canonical: F) -> Self
    where
        F: Fn(&str, NaiveDateTime) -> String,
    {
        let mut splits: Vec<(String, NaiveDateTime, f64)> = actions
            .iter()
            .filter(|a| a.is_split())
            .filter_map(|a| {
                let symbol = a.symbol.as_deref()?;
                let ratio = a.ratio.filter(|r| *r > 0.0 && r.is_finite())?;
                Some((canonical(symbol, a.timestamp), a.timestamp, ratio))
            })
            .collect();
        splits.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let mut by_ticker: HashMap<String, Vec<(NaiveDateTime, f64)>> = HashMap::new();
        for (ticker, ts, ratio) in splits {
            let entries = by_ticker.entry(ticker).or_default();
            let cumulative = entries.last().map(|(_, c)| c * ratio).unwrap_or(ratio);
            entries.push((ts, cumulative));
        }
        Self { by_ticker }
    }

    pub fn is_empty(&self) -> bool {
        self.by_ticker.is_empty()
    }

    /// Product of ratios of all splits dated strictly after `at`.
    ///
    /// Equals total cumulative product divided by the cumulative product
    /// reached at or before `at`. 1.0 when no later split exists.
    pub fn ratio_after(&self, ticker: &str, at: NaiveDateTime) -> f64 {
        let Some(entries) = self.by_ticker.get(ticker) else {
            return 1.0;
        };
        let Some(&(_, total)) = entries.last() else {
            return 1.0;
        };
        let before = entries
            .iter()
            .take_while(|(ts, _)| *ts <= at)
            .last()
            .map(|(_, c)| *c)
            .unwrap_or(1.0);
        total / before
    }
}

/// Re-express trades in current share terms.
///
/// `quantity = orig_quantity * split_ratio`, `price = orig_price / split_ratio`,
/// so `quantity * price` is invariant.
pub fn adjust_for_splits<'a, I>(trades: I, schedule: &SplitSchedule)
where
    I: IntoIterator<Item = &'a mut Trade>,
{
    for trade in trades {
        let ratio = schedule.ratio_after(&trade.ticker, trade.timestamp);
        trade.split_ratio = ratio;
        trade.quantity = trade.orig_quantity.map(|q| q * ratio);
        trade.price = trade.orig_price.map(|p| p / ratio);
    }
}

/// Attach split ratios to position snapshots (quantities stay as reported).
pub fn add_split_data(snapshots: &mut [PositionSnapshot], schedule: &SplitSchedule) {
    for snap in snapshots.iter_mut() {
        snap.split_ratio = schedule.ratio_after(&snap.ticker, snap.as_of());
    }
}

/// Synthetic trades for spin-offs and acquisitions.
///
/// Each lands one second before the action so it precedes any same-day
/// trading in the new shares.
pub fn transfers_from_actions(actions: &[CorporateAction], account: &str) -> Vec<Trade> {
    actions
        .iter()
        .filter(|a| {
            matches!(
                a.kind,
                CorporateActionKind::Spinoff | CorporateActionKind::Acquisition
            )
        })
        .filter_map(|a| {
            let symbol = a.symbol.clone()?;
            let quantity = a.quantity.unwrap_or(0.0);
            let raw_proceeds = a.proceeds.unwrap_or(0.0);
            let proceeds = if a.kind == CorporateActionKind::Acquisition && raw_proceeds == 0.0 {
                -a.value.unwrap_or(0.0)
            } else {
                raw_proceeds
            };
            let price = if quantity != 0.0 {
                (proceeds / quantity).abs()
            } else {
                0.0
            };
            let trade_type = match a.kind {
                CorporateActionKind::Spinoff => TradeType::Spinoff,
                _ => TradeType::Acquisition,
            };
            Some(finalize_trade(Trade {
                hash: TradeHash::from_hex(""),
                raw_symbol: symbol.clone(),
                display_suffix: String::new(),
                account: account.to_string(),
                currency: a.currency.clone(),
                timestamp: a.timestamp - Duration::seconds(1),
                orig_quantity: Some(quantity),
                orig_price: Some(price),
                proceeds: Some(proceeds),
                commission: Some(0.0),
                basis: Some(0.0),
                realized_pnl: a.realized_pnl,
                action: if quantity >= 0.0 {
                    TradeAction::Open
                } else {
                    TradeAction::Close
                },
                trade_type: Some(trade_type),
                target: None,
                manual: false,
                ticker: symbol,
                quantity: None,
                price: None,
                split_ratio: 1.0,
                accumulated_quantity: 0.0,
                account_accumulated_quantity: 0.0,
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn split(symbol: &str, at: NaiveDateTime, ratio: f64) -> CorporateAction {
        CorporateAction {
            symbol: Some(symbol.into()),
            timestamp: at,
            kind: CorporateActionKind::Split,
            ratio: Some(ratio),
            target: None,
            currency: "USD".into(),
            description: String::new(),
            quantity: None,
            proceeds: None,
            value: None,
            realized_pnl: None,
        }
    }

    fn identity(symbol: &str, _at: NaiveDateTime) -> String {
        symbol.to_string()
    }

    #[test]
    fn parses_split() {
        let p =
            parse_action_text("AAPL(US0378331005) Split 4 for 1 (AAPL, APPLE INC, US0378331005)");
        assert_eq!(p.kind, CorporateActionKind::Split);
        assert_eq!(p.symbol.as_deref(), Some("AAPL"));
        assert_eq!(p.ratio, Some(4.0));
    }

    #[test]
    fn parses_reverse_split() {
        let p = parse_action_text("XYZ(US0000000001) Split 1 for 10 (XYZ, ...)");
        assert_eq!(p.ratio, Some(0.1));
    }

    #[test]
    fn parses_spinoff() {
        let p = parse_action_text(
            "GE(US3696043013) Spinoff  1 for 3 (GEHC, GE HEALTHCARE TECHNOLOGY, US36266G1076)",
        );
        assert_eq!(p.kind, CorporateActionKind::Spinoff);
        assert_eq!(p.symbol.as_deref(), Some("GEHC"));
        assert!((p.ratio.unwrap() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn parses_acquisitions() {
        let cash =
            parse_action_text("ATVI(US00507V1098) Merged(Acquisition) FOR USD 95.00 PER SHARE");
        assert_eq!(cash.kind, CorporateActionKind::Acquisition);
        assert_eq!(cash.symbol.as_deref(), Some("ATVI"));
        assert_eq!(cash.ratio, Some(95.0));

        let stock = parse_action_text(
            "MRO(US5658491064) Merged(Acquisition) WITH US20825C1045 255 for 1000 (COP, CONOCOPHILLIPS, US20825C1045)",
        );
        assert_eq!(stock.symbol.as_deref(), Some("COP"));
        assert_eq!(stock.target.as_deref(), Some("MRO"));
        assert_eq!(stock.ratio, Some(0.255));
    }

    #[test]
    fn unknown_text_degrades() {
        let p = parse_action_text("TSLA(US88160R1014) Something Else");
        assert_eq!(p.kind, CorporateActionKind::Unknown);
        assert_eq!(p.symbol.as_deref(), Some("TSLA"));

        let d = parse_action_text("Cash Dividend paid");
        assert_eq!(d.kind, CorporateActionKind::Dividend);

        let u = parse_action_text("garbage");
        assert_eq!(u, ParsedAction::unknown(None));
    }

    #[test]
    fn ratio_after_multiplies_only_later_splits() {
        let actions = vec![
            split("NVDA", ts(2021, 7, 20), 4.0),
            split("NVDA", ts(2024, 6, 10), 10.0),
        ];
        let schedule = SplitSchedule::build(&actions, identity);
        assert_eq!(schedule.ratio_after("NVDA", ts(2020, 1, 1)), 40.0);
        assert_eq!(schedule.ratio_after("NVDA", ts(2022, 1, 1)), 10.0);
        assert_eq!(schedule.ratio_after("NVDA", ts(2024, 6, 10)), 1.0);
        assert_eq!(schedule.ratio_after("NVDA", ts(2025, 1, 1)), 1.0);
        assert_eq!(schedule.ratio_after("AMD", ts(2020, 1, 1)), 1.0);
    }

    #[test]
    fn non_split_actions_are_ignored() {
        let mut spin = split("GE", ts(2023, 1, 4), 3.0);
        spin.kind = CorporateActionKind::Spinoff;
        let schedule = SplitSchedule::build(&[spin], identity);
        assert!(schedule.is_empty());
    }

    #[test]
    fn spinoff_generates_opening_trade() {
        let action = CorporateAction {
            symbol: Some("GEHC".into()),
            timestamp: ts(2023, 1, 4),
            kind: CorporateActionKind::Spinoff,
            ratio: Some(1.0 / 3.0),
            target: None,
            currency: "USD".into(),
            description: String::new(),
            quantity: Some(10.0),
            proceeds: Some(550.0),
            value: Some(550.0),
            realized_pnl: Some(0.0),
        };
        let trades = transfers_from_actions(&[action], "U1");
        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.action, TradeAction::Open);
        assert_eq!(t.trade_type, Some(TradeType::Spinoff));
        assert_eq!(t.orig_price, Some(55.0));
        assert_eq!(t.timestamp, ts(2023, 1, 4) - Duration::seconds(1));
        assert!(!t.hash.as_str().is_empty());
    }

    #[test]
    fn share_acquisition_uses_negated_value() {
        let action = CorporateAction {
            symbol: Some("COP".into()),
            timestamp: ts(2024, 11, 22),
            kind: CorporateActionKind::Acquisition,
            ratio: Some(0.255),
            target: Some("MRO".into()),
            currency: "USD".into(),
            description: String::new(),
            quantity: Some(-100.0),
            proceeds: Some(0.0),
            value: Some(2800.0),
            realized_pnl: None,
        };
        let trades = transfers_from_actions(&[action], "U1");
        assert_eq!(trades[0].action, TradeAction::Close);
        assert_eq!(trades[0].proceeds, Some(-2800.0));
        assert_eq!(trades[0].orig_price, Some(28.0));
    }
}
