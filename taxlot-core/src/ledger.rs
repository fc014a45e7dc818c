//! The ledger: content-addressed trades plus the corporate actions, symbol
//! table, position snapshots, dividends and import records that describe
//! them.
//!
//! - `merge`: idempotent union of two ledgers; an existing trade hash is
//!   never overwritten.
//! - `recompute`: pure rebuild of every derived field (tickers, split
//!   adjustment, accumulated positions).
//! - `pairs`: lot matching, cached per (strategy, scope) and epoch.

use crate::corporate_actions::{add_split_data, adjust_for_splits, SplitSchedule};
use crate::domain::{
    CorporateAction, Dividend, Epoch, ImportRecord, PositionSnapshot, RenameHistoryRow, Trade,
    TradeHash,
};
use crate::matching::{match_trades, MatchResult, MatchScope, MatchStrategy, Pairings};
use crate::normalize::finalize_trade;
use crate::reconcile::{self, compute_accumulated_positions, DataQualityWarning};
use crate::renames::SymbolTable;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    trades: BTreeMap<TradeHash, Trade>,
    pub actions: Vec<CorporateAction>,
    pub symbols: SymbolTable,
    pub positions: Vec<PositionSnapshot>,
    pub dividends: Vec<Dividend>,
    pub imports: Vec<ImportRecord>,
    epoch: Epoch,
    pairings: Pairings,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger holding `trades`; later duplicates of a hash are dropped.
    pub fn from_trades(trades: impl IntoIterator<Item = Trade>) -> Self {
        let mut ledger = Self::default();
        ledger.insert_trades(trades);
        ledger
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn trade(&self, hash: &TradeHash) -> Option<&Trade> {
        self.trades.get(hash)
    }

    pub fn contains(&self, hash: &TradeHash) -> bool {
        self.trades.contains_key(hash)
    }

    /// Trades in hash order.
    pub fn trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.values()
    }

    /// Trades ordered by (timestamp, hash).
    pub fn trades_chronological(&self) -> Vec<&Trade> {
        let mut trades: Vec<&Trade> = self.trades.values().collect();
        trades.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.hash.cmp(&b.hash)));
        trades
    }

    pub fn pairings(&self) -> &Pairings {
        &self.pairings
    }

    /// Insert trades keyed by hash, keeping existing entries. Returns the
    /// timestamps of the trades that were actually added.
    fn insert_trades(&mut self, trades: impl IntoIterator<Item = Trade>) -> Vec<NaiveDateTime> {
        let mut added = Vec::new();
        for trade in trades {
            if self.trades.contains_key(&trade.hash) {
                continue;
            }
            added.push(trade.timestamp);
            self.trades.insert(trade.hash.clone(), trade);
        }
        added
    }

    /// Discard every cached pairing and move to the next epoch. Pairing is
    /// replayed from the first trade, so nothing cached before `from`
    /// survives either.
    fn invalidate(&mut self, from: NaiveDateTime) {
        let dropped = self.pairings.len();
        self.pairings.clear();
        self.epoch = self.epoch.next();
        tracing::debug!(%from, dropped, epoch = %self.epoch, "invalidated pairings");
    }

    /// Union `other` into this ledger. Returns the number of new trades.
    ///
    /// Corporate actions from `other` are placed first and then
    /// deduplicated, as are position snapshots (by symbol and date). Import
    /// records, dividends and symbol rows are unioned with existing entries
    /// first. New trades discard every cached pairing.
    pub fn merge_with(&mut self, other: &Ledger) -> usize {
        let added = self.insert_trades(other.trades.values().cloned());

        let mut actions = other.actions.clone();
        actions.extend(self.actions.drain(..));
        self.actions = dedup_keep_first(actions);

        let mut positions = other.positions.clone();
        positions.extend(self.positions.drain(..));
        let mut seen: HashSet<(String, chrono::NaiveDate)> = HashSet::new();
        positions.retain(|p| seen.insert((p.symbol.clone(), p.date)));
        self.positions = positions;

        let mut imports = std::mem::take(&mut self.imports);
        imports.extend(other.imports.iter().cloned());
        self.imports = dedup_keep_first(imports);

        let mut dividends = std::mem::take(&mut self.dividends);
        dividends.extend(other.dividends.iter().cloned());
        self.dividends = dedup_keep_first(dividends);

        self.symbols.extend(other.symbols.rows().iter().cloned());

        let imported = added.len();
        if let Some(earliest) = added.into_iter().min() {
            self.invalidate(earliest);
        }
        tracing::info!(imported, trades = self.trades.len(), epoch = %self.epoch, "merged ledger");
        imported
    }

    /// Add hand-entered trades. They are flagged manual, keep their raw
    /// symbol as ticker and are never renamed. The ledger is recomputed.
    pub fn add_manual_trades(&mut self, trades: impl IntoIterator<Item = Trade>) -> usize {
        let trades: Vec<Trade> = trades
            .into_iter()
            .map(|mut t| {
                t.manual = true;
                t.ticker = t.raw_symbol.clone();
                finalize_trade(t)
            })
            .collect();
        let added = self.insert_trades(trades);
        let count = added.len();
        if let Some(earliest) = added.into_iter().min() {
            self.invalidate(earliest);
            *self = recompute(self);
        }
        tracing::info!(added = count, "added manual trades");
        count
    }

    /// Fold an external rename history into the symbol table and rebuild
    /// derived fields. Returns the number of rename rows taken.
    pub fn apply_rename_history(&mut self, history: &[RenameHistoryRow]) -> usize {
        register_symbols(self);
        let taken = self.symbols.apply_history(history);
        *self = recompute(self);
        taken
    }

    /// Lot-matching result for the current epoch, computed on a cache miss.
    pub fn pairs(&mut self, strategy: MatchStrategy, scope: MatchScope) -> MatchResult {
        if let Some(result) = self.pairings.get(strategy, scope, self.epoch) {
            return result.clone();
        }
        let result = match_trades(self.trades.values(), strategy, scope, self.epoch);
        self.pairings.insert(result.clone());
        result
    }

    /// Run every data-quality detector over the reconciled trades.
    pub fn check(&self) -> Vec<DataQualityWarning> {
        let trades: Vec<Trade> = self.trades_chronological().into_iter().cloned().collect();
        reconcile::check(&trades)
    }
}

/// `merge(A, B) -> (C, importedCount)`.
pub fn merge(a: &Ledger, b: &Ledger) -> (Ledger, usize) {
    let mut merged = a.clone();
    let imported = merged.merge_with(b);
    (merged, imported)
}

/// Rebuild every derived field from source fields and the current action
/// and symbol tables.
///
/// Idempotent: running it on its own output changes nothing, including the
/// epoch, which only moves when some trade's derived fields changed.
pub fn recompute(ledger: &Ledger) -> Ledger {
    let mut next = ledger.clone();
    register_symbols(&mut next);

    let symbols = &next.symbols;
    let mut trades: Vec<Trade> = next.trades.values().cloned().collect();
    for trade in trades.iter_mut() {
        trade.reset_derived();
        trade.ticker = if trade.manual {
            trade.raw_symbol.clone()
        } else {
            symbols.resolve(&trade.raw_symbol, trade.timestamp)
        };
    }
    for snap in next.positions.iter_mut() {
        snap.ticker = symbols.resolve(&snap.symbol, snap.as_of());
    }
    for dividend in next.dividends.iter_mut() {
        let at = dividend.date.and_hms_opt(0, 0, 0).unwrap_or_default();
        dividend.ticker = symbols.resolve(&dividend.symbol, at);
    }

    let schedule = SplitSchedule::build(&next.actions, |s, at| symbols.resolve(s, at));
    adjust_for_splits(trades.iter_mut(), &schedule);
    compute_accumulated_positions(&mut trades);
    add_split_data(&mut next.positions, &schedule);

    let rebuilt: BTreeMap<TradeHash, Trade> =
        trades.into_iter().map(|t| (t.hash.clone(), t)).collect();
    if rebuilt != next.trades {
        next.trades = rebuilt;
        next.epoch = next.epoch.next();
        tracing::debug!(epoch = %next.epoch, "derived fields changed");
    }
    next
}

/// Give every raw symbol an identity row with the currency of its first
/// trade. Existing rows win.
fn register_symbols(ledger: &mut Ledger) {
    let mut first_currency: BTreeMap<&str, (NaiveDateTime, &str)> = BTreeMap::new();
    for t in ledger.trades.values() {
        first_currency
            .entry(t.raw_symbol.as_str())
            .and_modify(|(at, ccy)| {
                if t.timestamp < *at {
                    *at = t.timestamp;
                    *ccy = t.currency.as_str();
                }
            })
            .or_insert((t.timestamp, t.currency.as_str()));
    }
    let mut rows: Vec<(String, Option<String>)> = first_currency
        .into_iter()
        .map(|(s, (_, ccy))| (s.to_string(), Some(ccy.to_string())))
        .collect();
    for p in &ledger.positions {
        rows.push((p.symbol.clone(), None));
    }
    for d in &ledger.dividends {
        rows.push((d.symbol.clone(), Some(d.currency.clone())));
    }
    ledger
        .symbols
        .register_symbols(rows.iter().map(|(s, c)| (s.as_str(), c.as_deref())));
}

fn dedup_keep_first<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
