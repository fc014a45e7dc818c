//! Cached match results, one per (strategy, scope).
//!
//! Results are never patched. A result is served only while its epoch equals
//! the ledger's; anything else is recomputed in full.

use super::{MatchResult, MatchScope, MatchStrategy};
use crate::domain::Epoch;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pairings {
    results: BTreeMap<(MatchStrategy, MatchScope), MatchResult>,
}

impl Pairings {
    /// The cached result for `strategy`/`scope` if it was computed at `epoch`.
    pub fn get(
        &self,
        strategy: MatchStrategy,
        scope: MatchScope,
        epoch: Epoch,
    ) -> Option<&MatchResult> {
        self.results
            .get(&(strategy, scope))
            .filter(|r| r.epoch == epoch)
    }

    pub fn insert(&mut self, result: MatchResult) {
        self.results.insert((result.strategy, result.scope), result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Trade, TradeAction};
    use crate::matching::match_trades;
    use crate::normalize::finalize_trade;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn result(epoch: Epoch) -> MatchResult {
        let trades: Vec<Trade> = [
            (1, 10.0, TradeAction::Open),
            (2, -4.0, TradeAction::Close),
            (5, -4.0, TradeAction::Close),
        ]
        .into_iter()
        .map(|(d, q, a)| finalize_trade(Trade::new("V", "U1", "USD", ts(d), q, 100.0, a)))
        .collect();
        match_trades(&trades, MatchStrategy::Fifo, MatchScope::Global, epoch)
    }

    #[test]
    fn stale_epoch_is_not_served() {
        let mut p = Pairings::default();
        p.insert(result(Epoch(3)));
        assert!(p.get(MatchStrategy::Fifo, MatchScope::Global, Epoch(3)).is_some());
        assert!(p.get(MatchStrategy::Fifo, MatchScope::Global, Epoch(4)).is_none());
        assert!(p.get(MatchStrategy::Lifo, MatchScope::Global, Epoch(3)).is_none());
    }

    #[test]
    fn clear_forgets_every_strategy() {
        let mut p = Pairings::default();
        p.insert(result(Epoch(0)));
        let mut lifo = result(Epoch(0));
        lifo.strategy = MatchStrategy::Lifo;
        p.insert(lifo);
        assert_eq!(p.len(), 2);
        p.clear();
        assert!(p.is_empty());
        assert!(p.get(MatchStrategy::Fifo, MatchScope::Global, Epoch(0)).is_none());
    }
}
