//! Criterion benchmarks for ledger hot paths.
//!
//! Benchmarks:
//! 1. Lot matching per strategy (global scope)
//! 2. Full recompute with a split schedule
//! 3. Trade fingerprinting

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use taxlot_core::domain::{CorporateAction, CorporateActionKind, Trade, TradeAction};
use taxlot_core::fingerprint::trade_hash;
use taxlot_core::normalize::finalize_trade;
use taxlot_core::{match_trades, recompute, Ledger, MatchScope, MatchStrategy};

// ── Helpers ──────────────────────────────────────────────────────────

const SYMBOLS: [&str; 8] = ["AAPL", "MSFT", "NVDA", "CEZ", "KO", "PEP", "V", "MA"];

fn make_trades(n: usize) -> Vec<Trade> {
    let base = chrono::NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let symbol = SYMBOLS[i % SYMBOLS.len()];
            let at = base + chrono::Duration::hours(i as i64);
            let price = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            // Three buys for every sell keeps inventory positive.
            let (qty, action) = if i % 4 == 3 {
                (-20.0, TradeAction::Close)
            } else {
                (10.0, TradeAction::Open)
            };
            finalize_trade(
                Trade::new(symbol, "U1", "USD", at, qty, price, action).with_commission(-1.0),
            )
        })
        .collect()
}

// ── 1. Matching ──────────────────────────────────────────────────────

fn bench_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_trades");
    for &n in &[1_000usize, 10_000] {
        let trades = make_trades(n);
        for strategy in MatchStrategy::ALL {
            group.bench_with_input(BenchmarkId::new(strategy.as_str(), n), &n, |b, _| {
                b.iter(|| {
                    match_trades(
                        black_box(&trades),
                        strategy,
                        MatchScope::Global,
                        Default::default(),
                    )
                })
            });
        }
    }
    group.finish();
}

// ── 2. Recompute ─────────────────────────────────────────────────────

fn bench_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("recompute");
    for &n in &[1_000usize, 10_000] {
        let mut ledger = Ledger::from_trades(make_trades(n));
        ledger.actions.push(CorporateAction {
            symbol: Some("NVDA".into()),
            timestamp: chrono::NaiveDate::from_ymd_opt(2020, 6, 10)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            kind: CorporateActionKind::Split,
            ratio: Some(4.0),
            target: None,
            currency: "USD".into(),
            description: String::new(),
            quantity: None,
            proceeds: None,
            value: None,
            realized_pnl: None,
        });
        group.bench_with_input(BenchmarkId::new("with_split", n), &n, |b, _| {
            b.iter(|| recompute(black_box(&ledger)))
        });
    }
    group.finish();
}

// ── 3. Fingerprint ───────────────────────────────────────────────────

fn bench_fingerprint(c: &mut Criterion) {
    let trades = make_trades(1_000);
    c.bench_function("trade_hash_1000", |b| {
        b.iter(|| {
            for t in &trades {
                black_box(trade_hash(black_box(t)));
            }
        })
    });
}

criterion_group!(benches, bench_matching, bench_recompute, bench_fingerprint);
criterion_main!(benches);
