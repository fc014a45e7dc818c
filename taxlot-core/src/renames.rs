//! Symbol rename resolution.
//!
//! The symbol table holds every raw symbol seen in the ledger plus the rename
//! history that applies to them. A row dated `d` under raw symbol `s`
//! resolves to the ticker of the row with `symbol == s` and a change date
//! that is null or not earlier than `d`, preferring the smallest non-null
//! change date. Resolution then continues from the new ticker at the rename
//! boundary, so a chain `A → B → C` lands on `C`.

use crate::domain::{RenameHistoryRow, SymbolRename};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Upper bound on rename hops; guards against cyclic histories.
const MAX_CHAIN: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolTable {
    rows: Vec<SymbolRename>,
}

impl SymbolTable {
    pub fn new(rows: Vec<SymbolRename>) -> Self {
        let mut table = Self { rows: Vec::new() };
        table.extend(rows);
        table
    }

    pub fn rows(&self) -> &[SymbolRename] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.rows.iter().any(|r| r.symbol == symbol)
    }

    /// Append rows, dropping exact duplicates. A manual row replaces any
    /// automatic row with the same key, whichever arrives first; otherwise
    /// earlier rows win.
    pub fn extend<I: IntoIterator<Item = SymbolRename>>(&mut self, rows: I) {
        for row in rows {
            if self.rows.contains(&row) {
                continue;
            }
            if row.manual {
                self.rows.retain(|r| r.manual || r.key() != row.key());
                self.rows.push(row);
                continue;
            }
            let shadowed = self
                .rows
                .iter()
                .any(|r| r.manual && r.key() == row.key());
            if shadowed {
                continue;
            }
            let same_identity = row.change_date.is_none()
                && self
                    .rows
                    .iter()
                    .any(|r| r.symbol == row.symbol && r.change_date.is_none());
            if same_identity {
                continue;
            }
            self.rows.push(row);
        }
    }

    /// Ensure every symbol has a null-change-date row. Existing rows win.
    pub fn register_symbols<'a, I>(&mut self, symbols: I)
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let rows: Vec<SymbolRename> = symbols
            .into_iter()
            .map(|(s, ccy)| SymbolRename::identity(s, ccy.map(str::to_string)))
            .collect();
        self.extend(rows);
    }

    /// Select the row covering `symbol` at `at`.
    pub fn select(&self, symbol: &str, at: NaiveDateTime) -> Option<&SymbolRename> {
        self.rows
            .iter()
            .filter(|r| r.symbol == symbol && r.covers(at))
            .min_by(|a, b| match (a.change_date, b.change_date) {
                (Some(x), Some(y)) => x.cmp(&y).then_with(|| b.manual.cmp(&a.manual)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => b.manual.cmp(&a.manual),
            })
    }

    /// Canonical ticker for a raw symbol at a point in time.
    pub fn resolve(&self, symbol: &str, at: NaiveDateTime) -> String {
        let mut current = symbol.to_string();
        let mut at = at;
        let mut seen: HashSet<String> = HashSet::new();
        for _ in 0..MAX_CHAIN {
            if !seen.insert(current.clone()) {
                break;
            }
            let Some(row) = self.select(&current, at) else {
                break;
            };
            if row.ticker == current {
                break;
            }
            if let Some(boundary) = row.change_date {
                at = boundary;
            }
            current = row.ticker.clone();
        }
        current
    }

    /// Merge an external rename history into the table.
    ///
    /// Only symbols already known are affected. Kept rows are those with no
    /// change date or flagged manual; the new automatic rows inherit the
    /// currency of their symbol, which assumes the currency does not change
    /// across a rename. The table ends sorted by `(change_date, symbol)`
    /// with null dates last.
    pub fn apply_history(&mut self, history: &[RenameHistoryRow]) -> usize {
        let kept: Vec<SymbolRename> = self
            .rows
            .iter()
            .filter(|r| r.change_date.is_none() || r.manual)
            .cloned()
            .collect();

        let mut currency_lookup: HashMap<&str, Option<&str>> = HashMap::new();
        for row in &kept {
            currency_lookup
                .entry(row.symbol.as_str())
                .or_insert(row.currency.as_deref());
        }

        let active: Vec<SymbolRename> = history
            .iter()
            .filter(|h| self.contains_symbol(&h.old))
            .map(|h| SymbolRename {
                symbol: h.old.clone(),
                ticker: h.new.clone(),
                change_date: Some(h.change_date),
                currency: currency_lookup
                    .get(h.old.as_str())
                    .copied()
                    .flatten()
                    .map(str::to_string),
                manual: false,
            })
            .collect();
        let added = active.len();

        let mut table = SymbolTable { rows: Vec::new() };
        table.extend(kept);
        table.extend(active);
        table.rows.sort_by(|a, b| {
            let by_date = match (a.change_date, b.change_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            };
            by_date.then_with(|| a.symbol.cmp(&b.symbol))
        });
        *self = table;
        tracing::debug!(renames = added, rows = self.rows.len(), "applied rename history");
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn rename(symbol: &str, ticker: &str, at: Option<NaiveDateTime>) -> SymbolRename {
        SymbolRename {
            symbol: symbol.into(),
            ticker: ticker.into(),
            change_date: at,
            currency: Some("USD".into()),
            manual: false,
        }
    }

    #[test]
    fn trade_before_rename_takes_new_name() {
        let table = SymbolTable::new(vec![
            SymbolRename::identity("FB", Some("USD".into())),
            rename("FB", "META", Some(ts(2022, 6, 9))),
        ]);
        assert_eq!(table.resolve("FB", ts(2021, 1, 1)), "META");
        assert_eq!(table.resolve("FB", ts(2022, 6, 9)), "META");
        // A later listing reusing the old symbol keeps it.
        assert_eq!(table.resolve("FB", ts(2023, 1, 1)), "FB");
    }

    #[test]
    fn earliest_covering_boundary_wins() {
        let table = SymbolTable::new(vec![
            rename("X", "Y", Some(ts(2020, 1, 1))),
            rename("X", "Z", Some(ts(2022, 1, 1))),
            SymbolRename::identity("X", None),
        ]);
        assert_eq!(table.select("X", ts(2019, 1, 1)).unwrap().ticker, "Y");
        assert_eq!(table.select("X", ts(2021, 1, 1)).unwrap().ticker, "Z");
        assert_eq!(table.select("X", ts(2023, 1, 1)).unwrap().ticker, "X");
    }

    #[test]
    fn chain_is_walked_forward() {
        let table = SymbolTable::new(vec![
            SymbolRename::identity("A", None),
            SymbolRename::identity("B", None),
            SymbolRename::identity("C", None),
            rename("A", "B", Some(ts(2020, 1, 1))),
            rename("B", "C", Some(ts(2022, 1, 1))),
        ]);
        assert_eq!(table.resolve("A", ts(2019, 6, 1)), "C");
        assert_eq!(table.resolve("B", ts(2021, 6, 1)), "C");
        assert_eq!(table.resolve("B", ts(2023, 6, 1)), "B");
    }

    #[test]
    fn unknown_symbol_resolves_to_itself() {
        let table = SymbolTable::default();
        assert_eq!(table.resolve("QQQ", ts(2024, 1, 1)), "QQQ");
    }

    #[test]
    fn cycles_terminate() {
        let table = SymbolTable::new(vec![
            rename("A", "B", Some(ts(2030, 1, 1))),
            rename("B", "A", Some(ts(2030, 1, 1))),
        ]);
        let resolved = table.resolve("A", ts(2020, 1, 1));
        assert!(resolved == "A" || resolved == "B");
    }

    #[test]
    fn manual_rows_shadow_automatic_ones() {
        let mut manual = rename("SQ", "XYZ", Some(ts(2025, 1, 21)));
        manual.manual = true;
        let mut table = SymbolTable::new(vec![SymbolRename::identity("SQ", None), manual]);
        table.apply_history(&[RenameHistoryRow {
            old: "SQ".into(),
            new: "BLOCK".into(),
            change_date: ts(2025, 1, 21),
        }]);
        assert_eq!(table.resolve("SQ", ts(2024, 1, 1)), "XYZ");
    }

    #[test]
    fn manual_row_loaded_after_automatic_row_replaces_it() {
        let mut manual = rename("SQ", "XYZ", Some(ts(2025, 1, 21)));
        manual.manual = true;
        let table = SymbolTable::new(vec![
            SymbolRename::identity("SQ", None),
            rename("SQ", "BLOCK", Some(ts(2025, 1, 21))),
            manual,
        ]);
        assert_eq!(table.len(), 2);
        assert!(table.rows().iter().all(|r| r.ticker != "BLOCK"));
        assert_eq!(table.resolve("SQ", ts(2024, 1, 1)), "XYZ");
    }

    #[test]
    fn select_prefers_manual_row_on_equal_boundary() {
        let mut manual = rename("SQ", "XYZ", Some(ts(2025, 1, 21)));
        manual.manual = true;
        // Bypass `extend` to hold both rows at once.
        let table = SymbolTable {
            rows: vec![rename("SQ", "BLOCK", Some(ts(2025, 1, 21))), manual],
        };
        assert_eq!(table.select("SQ", ts(2024, 1, 1)).unwrap().ticker, "XYZ");
    }

    #[test]
    fn history_restricted_to_known_symbols_and_inherits_currency() {
        let mut table = SymbolTable::new(vec![SymbolRename::identity("CEZ", Some("CZK".into()))]);
        let added = table.apply_history(&[
            RenameHistoryRow {
                old: "CEZ".into(),
                new: "CEZN".into(),
                change_date: ts(2024, 3, 1),
            },
            RenameHistoryRow {
                old: "NOTHELD".into(),
                new: "OTHER".into(),
                change_date: ts(2024, 3, 1),
            },
        ]);
        assert_eq!(added, 1);
        assert_eq!(table.len(), 2);
        let row = &table.rows()[0];
        assert_eq!(row.ticker, "CEZN");
        assert_eq!(row.currency.as_deref(), Some("CZK"));
        assert!(table.rows()[1].change_date.is_none());
    }

    #[test]
    fn registering_existing_symbol_keeps_first_row() {
        let mut override_row = SymbolRename::identity("BRK B", None);
        override_row.ticker = "BRK.B".into();
        override_row.manual = true;
        let mut table = SymbolTable::new(vec![override_row]);
        table.register_symbols([("BRK B", Some("USD"))]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve("BRK B", ts(2024, 1, 1)), "BRK.B");
    }
}
