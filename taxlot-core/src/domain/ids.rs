use serde::{Deserialize, Serialize};
use std::fmt;

/// Content hash of a trade's immutable source fields (BLAKE3, hex).
///
/// Two imports of the same brokerage event always produce the same hash,
/// so it doubles as the trade's primary key inside a ledger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeHash(pub String);

impl TradeHash {
    pub fn from_hex(hex: &str) -> Self {
        Self(hex.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for TradeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic counter bumped whenever the trade history changes in a way
/// that makes previously computed pairings stale.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Epoch(pub u64);

impl Epoch {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch#{}", self.0)
    }
}

/// Identity of an instrument stream: canonical ticker plus derivative suffix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstrumentKey {
    pub ticker: String,
    pub display_suffix: String,
}

impl InstrumentKey {
    pub fn new(ticker: impl Into<String>, display_suffix: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            display_suffix: display_suffix.into(),
        }
    }

    /// Ticker with the option qualifier appended, e.g. `CELH 20SEP24 40 Put`.
    pub fn display_name(&self) -> String {
        format!("{}{}", self.ticker, self.display_suffix)
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.ticker, self.display_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_is_prefix() {
        let h = TradeHash::from_hex("0123456789abcdef0123");
        assert_eq!(h.short(), "0123456789ab");
        assert_eq!(TradeHash::from_hex("abc").short(), "abc");
    }

    #[test]
    fn epoch_advances() {
        let e = Epoch::default();
        assert_eq!(e.next(), Epoch(1));
        assert!(e.next() > e);
    }

    #[test]
    fn display_name_joins_suffix() {
        let key = InstrumentKey::new("CELH", " 20SEP24 40 Put");
        assert_eq!(key.display_name(), "CELH 20SEP24 40 Put");
        assert_eq!(InstrumentKey::new("SPY", "").to_string(), "SPY");
    }
}
