//! Stream matching: walk one instrument's trades in order and pair closes
//! against the lot book.

use super::lots::{LotBook, OpenLot, PositionSide};
use super::strategy::{MatchScope, MatchStrategy};
use super::{CloseCoverage, Pair, RemainingLot};
use crate::domain::{InstrumentKey, Trade, TradeAction, QUANTITY_EPSILON};
use std::cmp::Ordering;

/// What a trade does inside a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Open(PositionSide),
    Close(PositionSide),
    TransferIn,
    TransferOut,
}

impl Step {
    fn of(trade: &Trade, scope: MatchScope) -> Option<Self> {
        let q = trade.qty();
        if q.abs() <= QUANTITY_EPSILON {
            return None;
        }
        match trade.action {
            TradeAction::Open if q > 0.0 => Some(Step::Open(PositionSide::Long)),
            TradeAction::Open => Some(Step::Open(PositionSide::Short)),
            TradeAction::Close if q < 0.0 => Some(Step::Close(PositionSide::Long)),
            TradeAction::Close => Some(Step::Close(PositionSide::Short)),
            TradeAction::Transfer if scope == MatchScope::PerAccount => {
                Some(if q > 0.0 { Step::TransferIn } else { Step::TransferOut })
            }
            TradeAction::Transfer | TradeAction::Unknown => None,
        }
    }

    fn is_opening(self) -> bool {
        matches!(self, Step::Open(_) | Step::TransferIn)
    }
}

/// Output of one stream.
#[derive(Debug, Default)]
pub(super) struct StreamOutcome {
    pub pairs: Vec<Pair>,
    pub coverage: Vec<CloseCoverage>,
    pub remaining: Vec<RemainingLot>,
}

/// Match one stream of trades sharing an instrument (and account, in
/// per-account scope).
pub(super) fn match_stream(
    instrument: &InstrumentKey,
    account: Option<&str>,
    trades: &[&Trade],
    strategy: MatchStrategy,
    scope: MatchScope,
) -> StreamOutcome {
    let mut steps: Vec<(Step, &Trade)> = trades
        .iter()
        .filter_map(|t| Step::of(t, scope).map(|s| (s, *t)))
        .collect();
    steps.sort_by(|(sa, a), (sb, b)| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| match (sa.is_opening(), sb.is_opening()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            })
            .then_with(|| a.hash.cmp(&b.hash))
    });

    let mut long = LotBook::new(strategy, PositionSide::Long);
    let mut short = LotBook::new(strategy, PositionSide::Short);
    let mut out = StreamOutcome::default();

    for (step, trade) in steps {
        let q = trade.qty().abs();
        match step {
            Step::Open(_) | Step::TransferIn => {
                // Transferred lots arrive without a fee of their own.
                let (side, fee) = match step {
                    Step::Open(s) => (s, trade.fee()),
                    _ => (PositionSide::Long, 0.0),
                };
                let book = match side {
                    PositionSide::Long => &mut long,
                    PositionSide::Short => &mut short,
                };
                book.open(OpenLot {
                    trade: trade.hash.clone(),
                    timestamp: trade.timestamp,
                    original: q,
                    remaining: q,
                    price: trade.px(),
                    fee,
                });
            }
            Step::TransferOut => {
                let short_by = long.withdraw(q);
                if short_by > QUANTITY_EPSILON {
                    tracing::debug!(
                        instrument = %instrument,
                        trade = trade.hash.short(),
                        missing = short_by,
                        "transfer out exceeds open lots"
                    );
                }
            }
            Step::Close(side) => {
                let book = match side {
                    PositionSide::Long => &mut long,
                    PositionSide::Short => &mut short,
                };
                let close_price = trade.px();
                let close_fee = trade.fee();
                let mut covered = 0.0;
                for fill in book.close(q, close_price) {
                    covered += fill.quantity;
                    let close_share = close_fee * fill.quantity / q;
                    out.pairs.push(Pair::new(
                        instrument,
                        trade,
                        side,
                        fill,
                        close_share,
                        strategy,
                    ));
                }
                let uncovered = (q - covered).max(0.0);
                if uncovered > QUANTITY_EPSILON {
                    tracing::debug!(
                        instrument = %instrument,
                        trade = trade.hash.short(),
                        uncovered,
                        "close not fully covered by open lots"
                    );
                }
                out.coverage.push(CloseCoverage {
                    trade: trade.hash.clone(),
                    instrument: instrument.clone(),
                    account: trade.account.clone(),
                    timestamp: trade.timestamp,
                    quantity: q,
                    covered,
                    uncovered: if uncovered > QUANTITY_EPSILON { uncovered } else { 0.0 },
                });
            }
        }
    }

    for (side, book) in [(PositionSide::Long, &long), (PositionSide::Short, &short)] {
        for (open_trade, opened_at, quantity, price) in book.remaining() {
            out.remaining.push(RemainingLot {
                instrument: instrument.clone(),
                account: account.map(str::to_string),
                side,
                open_trade,
                opened_at,
                quantity,
                price,
            });
        }
    }
    out
}
