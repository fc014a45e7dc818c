//! Property tests for ledger and matching invariants.
//!
//! Uses proptest to verify:
//! 1. Idempotent merge: merge(merge(A, B), B) == merge(A, B)
//! 2. Conservation: pairs never match more than a close's quantity
//! 3. Split notional invariance: quantity * price survives adjustment
//! 4. Recompute idempotence: recompute(recompute(L)) == recompute(L)
//! 5. Input-order independence of matching

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use taxlot_core::domain::{CorporateAction, CorporateActionKind, Trade, TradeAction};
use taxlot_core::normalize::finalize_trade;
use taxlot_core::{match_trades, merge, recompute, Ledger, MatchScope, MatchStrategy};

// ── Strategies (proptest) ────────────────────────────────────────────

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2022, 1, 3)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

fn arb_symbol() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("AAPL"), Just("MSFT"), Just("CEZ")]
}

fn arb_trade() -> impl Strategy<Value = Trade> {
    (
        arb_symbol(),
        prop_oneof![Just("U1"), Just("U2")],
        0..720i64,
        1..50u32,
        (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(symbol, account, day, qty, price, opening, long)| {
            let qty = qty as f64;
            let (signed, action) = match (opening, long) {
                (true, true) => (qty, TradeAction::Open),
                (true, false) => (-qty, TradeAction::Open),
                (false, true) => (-qty, TradeAction::Close),
                (false, false) => (qty, TradeAction::Close),
            };
            let at = base() + Duration::days(day);
            finalize_trade(
                Trade::new(symbol, account, "USD", at, signed, price, action).with_commission(-1.0),
            )
        })
}

fn arb_trades() -> impl Strategy<Value = Vec<Trade>> {
    prop::collection::vec(arb_trade(), 0..40)
}

fn arb_strategy() -> impl Strategy<Value = MatchStrategy> {
    prop::sample::select(MatchStrategy::ALL.to_vec())
}

fn arb_scope() -> impl Strategy<Value = MatchScope> {
    prop_oneof![Just(MatchScope::Global), Just(MatchScope::PerAccount)]
}

fn split(symbol: &str, day: i64, ratio: f64) -> CorporateAction {
    CorporateAction {
        symbol: Some(symbol.into()),
        timestamp: base() + Duration::days(day),
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

// ── 1. Idempotent merge ──────────────────────────────────────────────

proptest! {
    #[test]
    fn merge_is_idempotent(a in arb_trades(), b in arb_trades()) {
        let a = Ledger::from_trades(a);
        let b = Ledger::from_trades(b);
        let (once, _) = merge(&a, &b);
        let (twice, imported) = merge(&once, &b);
        prop_assert_eq!(imported, 0);
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn merge_never_loses_trades(a in arb_trades(), b in arb_trades()) {
        let a = Ledger::from_trades(a);
        let b = Ledger::from_trades(b);
        let (c, imported) = merge(&a, &b);
        prop_assert_eq!(c.len(), a.len() + imported);
        for t in a.trades().chain(b.trades()) {
            prop_assert!(c.contains(&t.hash));
        }
    }
}

// ── 2. Conservation ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn pairs_never_exceed_close_quantity(
        trades in arb_trades(),
        strategy in arb_strategy(),
        scope in arb_scope(),
    ) {
        let ledger = recompute(&Ledger::from_trades(trades));
        let result = match_trades(ledger.trades(), strategy, scope, ledger.epoch());
        for c in &result.coverage {
            let matched: f64 = result.pairs_for_close(&c.trade).map(|p| p.matched_quantity).sum();
            prop_assert!(matched <= c.quantity + 1e-9);
            prop_assert!((matched + c.uncovered - c.quantity).abs() < 1e-6);
            prop_assert!((c.covered - matched).abs() < 1e-6);
        }
        for p in &result.pairs {
            prop_assert!(p.matched_quantity > 0.0);
            let expected = p.proceeds - p.cost_basis - p.allocated_commission;
            prop_assert!((p.realized_gain - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn opens_are_conserved(trades in arb_trades(), strategy in arb_strategy()) {
        let ledger = recompute(&Ledger::from_trades(trades));
        let result = match_trades(ledger.trades(), strategy, MatchScope::Global, ledger.epoch());
        let opened: f64 = ledger
            .trades()
            .filter(|t| t.action == TradeAction::Open)
            .map(|t| t.qty().abs())
            .sum();
        let matched: f64 = result.pairs.iter().map(|p| p.matched_quantity).sum();
        let left: f64 = result.remaining_lots.iter().map(|l| l.quantity).sum();
        prop_assert!((opened - matched - left).abs() < 1e-6);
    }
}

// ── 3. Split notional invariance ─────────────────────────────────────

proptest! {
    #[test]
    fn split_preserves_notional(
        trades in arb_trades(),
        day in 0..720i64,
        ratio in prop_oneof![Just(2.0), Just(3.0), Just(0.5), Just(10.0)],
    ) {
        let mut ledger = Ledger::from_trades(trades);
        ledger.actions.push(split("AAPL", day, ratio));
        let adjusted = recompute(&ledger);
        let split_at = base() + Duration::days(day);
        for t in adjusted.trades() {
            let before = t.orig_quantity.unwrap() * t.orig_price.unwrap();
            let after = t.qty() * t.px();
            prop_assert!((before - after).abs() < 1e-6 * before.abs().max(1.0));
            let expected = if t.ticker == "AAPL" && t.timestamp < split_at { ratio } else { 1.0 };
            prop_assert_eq!(t.split_ratio, expected);
        }
    }
}

// ── 4. Recompute idempotence ─────────────────────────────────────────

proptest! {
    #[test]
    fn recompute_is_idempotent(trades in arb_trades(), day in 0..720i64) {
        let mut ledger = Ledger::from_trades(trades);
        ledger.actions.push(split("MSFT", day, 4.0));
        let once = recompute(&ledger);
        let twice = recompute(&once);
        prop_assert_eq!(twice, once);
    }
}

// ── 5. Order independence ────────────────────────────────────────────

proptest! {
    #[test]
    fn matching_ignores_input_order(trades in arb_trades(), strategy in arb_strategy()) {
        let ledger = recompute(&Ledger::from_trades(trades));
        let forward: Vec<Trade> = ledger.trades().cloned().collect();
        let mut reversed = forward.clone();
        reversed.reverse();
        let a = match_trades(&forward, strategy, MatchScope::Global, ledger.epoch());
        let b = match_trades(&reversed, strategy, MatchScope::Global, ledger.epoch());
        prop_assert_eq!(a, b);
    }
}
