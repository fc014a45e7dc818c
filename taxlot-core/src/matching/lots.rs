//! Working set of open lots for one matching stream.
//!
//! Per-lot strategies keep one `OpenLot` per opening trade. Average-cost
//! keeps one `CostPool` per side instead; an opening trade loses its
//! identity as soon as it is merged into the pool.

use super::strategy::MatchStrategy;
use crate::domain::{TradeHash, QUANTITY_EPSILON};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Direction of a position: long lots are opened by buying, short lots by
/// selling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Gain per share of closing a lot opened at `open_price` at `close_price`.
    pub fn gain_per_share(self, open_price: f64, close_price: f64) -> f64 {
        match self {
            PositionSide::Long => close_price - open_price,
            PositionSide::Short => open_price - close_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenLot {
    pub trade: TradeHash,
    pub timestamp: NaiveDateTime,
    /// Unsigned quantity of the opening trade.
    pub original: f64,
    pub remaining: f64,
    pub price: f64,
    /// Unsigned commission of the whole opening trade.
    pub fee: f64,
}

impl OpenLot {
    /// Share of the opening commission attributable to `quantity`.
    pub fn fee_for(&self, quantity: f64) -> f64 {
        if self.original > QUANTITY_EPSILON {
            self.fee * quantity / self.original
        } else {
            0.0
        }
    }
}

/// Weighted-average pool used by the average-cost strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostPool {
    pub quantity: f64,
    pub price: f64,
    /// Unallocated opening commission carried by the pool.
    pub fee: f64,
    pub opened_at: Option<NaiveDateTime>,
}

impl CostPool {
    fn add(&mut self, quantity: f64, price: f64, fee: f64, at: NaiveDateTime) {
        let total = self.quantity + quantity;
        if total > QUANTITY_EPSILON {
            self.price = (self.quantity * self.price + quantity * price) / total;
        }
        self.quantity = total;
        self.fee += fee;
        self.opened_at = Some(self.opened_at.map_or(at, |t| t.min(at)));
    }

    /// Remove up to `quantity`, returning `(taken, fee share)`.
    fn take(&mut self, quantity: f64) -> (f64, f64) {
        let taken = quantity.min(self.quantity);
        let fee = if self.quantity > QUANTITY_EPSILON {
            self.fee * taken / self.quantity
        } else {
            0.0
        };
        self.quantity -= taken;
        self.fee -= fee;
        if self.quantity <= QUANTITY_EPSILON {
            *self = CostPool::default();
        }
        (taken, fee)
    }

    pub fn is_empty(&self) -> bool {
        self.quantity <= QUANTITY_EPSILON
    }
}

/// One consumption of open inventory by a close.
#[derive(Debug, Clone, PartialEq)]
pub struct LotFill {
    /// `None` when drawn from an average-cost pool.
    pub open_trade: Option<TradeHash>,
    pub opened_at: NaiveDateTime,
    pub quantity: f64,
    pub open_price: f64,
    pub open_fee: f64,
}

/// Open inventory for one side of one stream.
#[derive(Debug, Clone)]
pub struct LotBook {
    strategy: MatchStrategy,
    side: PositionSide,
    lots: Vec<OpenLot>,
    pool: CostPool,
}

impl LotBook {
    pub fn new(strategy: MatchStrategy, side: PositionSide) -> Self {
        Self {
            strategy,
            side,
            lots: Vec::new(),
            pool: CostPool::default(),
        }
    }

    pub fn open(&mut self, lot: OpenLot) {
        if lot.remaining <= QUANTITY_EPSILON {
            return;
        }
        if self.strategy == MatchStrategy::AverageCost {
            self.pool.add(lot.remaining, lot.price, lot.fee, lot.timestamp);
        } else {
            self.lots.push(lot);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty() && self.pool.is_empty()
    }

    /// Total open quantity.
    pub fn quantity(&self) -> f64 {
        self.lots.iter().map(|l| l.remaining).sum::<f64>() + self.pool.quantity
    }

    /// Consume up to `quantity` for a close at `close_price`, selecting lots
    /// per the strategy. Returns the fills in consumption order.
    pub fn close(&mut self, quantity: f64, close_price: f64) -> Vec<LotFill> {
        let mut fills = Vec::new();
        let mut left = quantity;

        if self.strategy == MatchStrategy::AverageCost {
            if !self.pool.is_empty() && left > QUANTITY_EPSILON {
                let opened_at = self.pool.opened_at.unwrap_or_default();
                let price = self.pool.price;
                let (taken, fee) = self.pool.take(left);
                fills.push(LotFill {
                    open_trade: None,
                    opened_at,
                    quantity: taken,
                    open_price: price,
                    open_fee: fee,
                });
            }
            return fills;
        }

        while left > QUANTITY_EPSILON {
            let Some(idx) = self.select(close_price) else {
                break;
            };
            let lot = &mut self.lots[idx];
            let taken = left.min(lot.remaining);
            fills.push(LotFill {
                open_trade: Some(lot.trade.clone()),
                opened_at: lot.timestamp,
                quantity: taken,
                open_price: lot.price,
                open_fee: lot.fee_for(taken),
            });
            lot.remaining -= taken;
            left -= taken;
            if lot.remaining <= QUANTITY_EPSILON {
                self.lots.remove(idx);
            }
        }
        fills
    }

    /// Remove up to `quantity` oldest-first without producing fills.
    /// Returns the quantity that could not be withdrawn.
    pub fn withdraw(&mut self, quantity: f64) -> f64 {
        if self.strategy == MatchStrategy::AverageCost {
            let (taken, _) = self.pool.take(quantity);
            return quantity - taken;
        }
        self.lots.sort_by(|a, b| tie_break(a, b));
        let mut left = quantity;
        while left > QUANTITY_EPSILON && !self.lots.is_empty() {
            let lot = &mut self.lots[0];
            let taken = left.min(lot.remaining);
            lot.remaining -= taken;
            left -= taken;
            if lot.remaining <= QUANTITY_EPSILON {
                self.lots.remove(0);
            }
        }
        left.max(0.0)
    }

    /// Lots still open, oldest first. Average-cost yields its pool as a
    /// single lot without a trade reference.
    pub fn remaining(&self) -> Vec<(Option<TradeHash>, NaiveDateTime, f64, f64)> {
        if self.strategy == MatchStrategy::AverageCost {
            if self.pool.is_empty() {
                return Vec::new();
            }
            return vec![(
                None,
                self.pool.opened_at.unwrap_or_default(),
                self.pool.quantity,
                self.pool.price,
            )];
        }
        let mut lots: Vec<&OpenLot> = self.lots.iter().collect();
        lots.sort_by(|a, b| tie_break(a, b));
        lots.into_iter()
            .map(|l| (Some(l.trade.clone()), l.timestamp, l.remaining, l.price))
            .collect()
    }

    fn select(&self, close_price: f64) -> Option<usize> {
        let side = self.side;
        let gain = |l: &OpenLot| side.gain_per_share(l.price, close_price);
        let better = |a: &OpenLot, b: &OpenLot| -> Ordering {
            match self.strategy {
                MatchStrategy::Fifo | MatchStrategy::AverageCost => tie_break(a, b),
                MatchStrategy::Lifo => b
                    .timestamp
                    .cmp(&a.timestamp)
                    .then_with(|| tie_break(a, b)),
                MatchStrategy::MaxLoss => gain(a)
                    .total_cmp(&gain(b))
                    .then_with(|| tie_break(a, b)),
                MatchStrategy::MaxProfit => gain(b)
                    .total_cmp(&gain(a))
                    .then_with(|| tie_break(a, b)),
            }
        };
        self.lots
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| better(*a, *b))
            .map(|(i, _)| i)
    }
}

/// Earliest timestamp, then smaller remaining quantity, then hash.
fn tie_break(a: &OpenLot, b: &OpenLot) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.remaining.total_cmp(&b.remaining))
        .then_with(|| a.trade.cmp(&b.trade))
}
