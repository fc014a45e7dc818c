//! Lot-matching engine.
//!
//! Pairs closing trades against open lots per instrument stream:
//! - Streams are keyed by (ticker, display suffix) and, in per-account
//!   scope, by account. Independent streams run in parallel.
//! - Within a stream trades are ordered by (timestamp, opens first, hash).
//! - A close consumes lots chosen by the [`MatchStrategy`] until its
//!   quantity is exhausted; any rest is reported as uncovered, never
//!   fabricated.
//! - Commission is pro-rated on both legs by matched quantity.

mod engine;
pub mod lots;
pub mod pairings;
pub mod strategy;

pub use lots::{LotFill, PositionSide};
pub use pairings::Pairings;
pub use strategy::{MatchScope, MatchStrategy};

use crate::domain::{Epoch, InstrumentKey, Trade, TradeAction, TradeHash, QUANTITY_EPSILON};
use chrono::{Datelike, NaiveDateTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One matched lot between an opening and a closing trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    /// `None` for average-cost pairs, which draw from a pooled lot.
    pub open_trade: Option<TradeHash>,
    pub close_trade: TradeHash,
    pub instrument: InstrumentKey,
    pub account: String,
    pub side: PositionSide,
    pub open_time: NaiveDateTime,
    pub close_time: NaiveDateTime,
    pub matched_quantity: f64,

    // ── Prices ──
    pub open_price: f64,
    pub close_price: f64,

    // ── Money ──
    pub proceeds: f64,
    pub cost_basis: f64,
    pub allocated_commission: f64,
    pub realized_gain: f64,

    pub strategy: MatchStrategy,
}

impl Pair {
    fn new(
        instrument: &InstrumentKey,
        close: &Trade,
        side: PositionSide,
        fill: LotFill,
        close_fee: f64,
        strategy: MatchStrategy,
    ) -> Self {
        let q = fill.quantity;
        let close_price = close.px();
        let (buy, sell) = match side {
            PositionSide::Long => (fill.open_price, close_price),
            PositionSide::Short => (close_price, fill.open_price),
        };
        let proceeds = sell * q;
        let cost_basis = buy * q;
        let allocated_commission = fill.open_fee + close_fee;
        Self {
            open_trade: fill.open_trade,
            close_trade: close.hash.clone(),
            instrument: instrument.clone(),
            account: close.account.clone(),
            side,
            open_time: fill.opened_at,
            close_time: close.timestamp,
            matched_quantity: q,
            open_price: fill.open_price,
            close_price,
            proceeds,
            cost_basis,
            allocated_commission,
            realized_gain: proceeds - cost_basis - allocated_commission,
            strategy,
        }
    }

    pub fn buy_price(&self) -> f64 {
        match self.side {
            PositionSide::Long => self.open_price,
            PositionSide::Short => self.close_price,
        }
    }

    pub fn sell_price(&self) -> f64 {
        match self.side {
            PositionSide::Long => self.close_price,
            PositionSide::Short => self.open_price,
        }
    }

    pub fn buy_time(&self) -> NaiveDateTime {
        match self.side {
            PositionSide::Long => self.open_time,
            PositionSide::Short => self.close_time,
        }
    }

    pub fn sell_time(&self) -> NaiveDateTime {
        match self.side {
            PositionSide::Long => self.close_time,
            PositionSide::Short => self.open_time,
        }
    }

    /// Whole days between opening and closing the lot.
    pub fn holding_days(&self) -> i64 {
        (self.close_time - self.open_time).num_days()
    }
}

/// How much of a close trade found open lots to pair with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseCoverage {
    pub trade: TradeHash,
    pub instrument: InstrumentKey,
    pub account: String,
    pub timestamp: NaiveDateTime,
    /// Unsigned quantity of the close.
    pub quantity: f64,
    pub covered: f64,
    /// Quantity with no open lot behind it; non-zero signals missing imports.
    pub uncovered: f64,
}

/// An open lot left after every close has been matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemainingLot {
    pub instrument: InstrumentKey,
    /// Set in per-account scope.
    pub account: Option<String>,
    pub side: PositionSide,
    pub open_trade: Option<TradeHash>,
    pub opened_at: NaiveDateTime,
    pub quantity: f64,
    pub price: f64,
}

/// Full output of one matching run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub strategy: MatchStrategy,
    pub scope: MatchScope,
    /// Ledger epoch the result was computed at.
    pub epoch: Epoch,
    pub pairs: Vec<Pair>,
    pub coverage: Vec<CloseCoverage>,
    pub remaining_lots: Vec<RemainingLot>,
}

impl MatchResult {
    pub fn pairs_for_close<'a>(&'a self, trade: &'a TradeHash) -> impl Iterator<Item = &'a Pair> {
        self.pairs.iter().filter(move |p| &p.close_trade == trade)
    }

    /// Closes with quantity left unpaired.
    pub fn uncovered(&self) -> impl Iterator<Item = &CloseCoverage> {
        self.coverage.iter().filter(|c| c.uncovered > QUANTITY_EPSILON)
    }

    /// Pairs whose close falls in one of `years`; all pairs when empty.
    pub fn pairs_closed_in<'a>(&'a self, years: &'a [i32]) -> impl Iterator<Item = &'a Pair> {
        self.pairs
            .iter()
            .filter(move |p| years.is_empty() || years.contains(&p.close_time.year()))
    }

    pub fn total_realized(&self) -> f64 {
        self.pairs.iter().map(|p| p.realized_gain).sum()
    }
}

type StreamKey = (InstrumentKey, Option<String>);

/// Match every stream of `trades` under one strategy and scope.
///
/// A pure function of its inputs: the same trades always produce the same
/// result regardless of input order.
pub fn match_trades<'a>(
    trades: impl IntoIterator<Item = &'a Trade>,
    strategy: MatchStrategy,
    scope: MatchScope,
    epoch: Epoch,
) -> MatchResult {
    let mut streams: BTreeMap<StreamKey, Vec<&Trade>> = BTreeMap::new();
    for trade in trades {
        match trade.action {
            TradeAction::Unknown => continue,
            TradeAction::Transfer if scope == MatchScope::Global => continue,
            _ => {}
        }
        let account = match scope {
            MatchScope::Global => None,
            MatchScope::PerAccount => Some(trade.account.clone()),
        };
        streams
            .entry((trade.instrument(), account))
            .or_default()
            .push(trade);
    }

    let streams: Vec<(StreamKey, Vec<&Trade>)> = streams.into_iter().collect();
    let outcomes: Vec<engine::StreamOutcome> = streams
        .par_iter()
        .map(|((instrument, account), stream)| {
            engine::match_stream(instrument, account.as_deref(), stream, strategy, scope)
        })
        .collect();

    let mut pairs = Vec::new();
    let mut coverage = Vec::new();
    let mut remaining_lots = Vec::new();
    for outcome in outcomes {
        pairs.extend(outcome.pairs);
        coverage.extend(outcome.coverage);
        remaining_lots.extend(outcome.remaining);
    }
    pairs.sort_by(|a, b| {
        a.close_time
            .cmp(&b.close_time)
            .then_with(|| a.instrument.cmp(&b.instrument))
            .then_with(|| a.close_trade.cmp(&b.close_trade))
            .then_with(|| a.open_time.cmp(&b.open_time))
            .then_with(|| a.open_trade.cmp(&b.open_trade))
    });
    coverage.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.trade.cmp(&b.trade)));

    tracing::debug!(
        %strategy,
        %scope,
        %epoch,
        streams = streams.len(),
        pairs = pairs.len(),
        "matched trades"
    );

    MatchResult {
        strategy,
        scope,
        epoch,
        pairs,
        coverage,
        remaining_lots,
    }
}
