use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lot selection rule applied when a close consumes open lots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    Fifo,
    Lifo,
    AverageCost,
    MaxLoss,
    MaxProfit,
}

impl MatchStrategy {
    pub const ALL: [MatchStrategy; 5] = [
        MatchStrategy::Fifo,
        MatchStrategy::Lifo,
        MatchStrategy::AverageCost,
        MatchStrategy::MaxLoss,
        MatchStrategy::MaxProfit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Fifo => "fifo",
            MatchStrategy::Lifo => "lifo",
            MatchStrategy::AverageCost => "average-cost",
            MatchStrategy::MaxLoss => "max-loss",
            MatchStrategy::MaxProfit => "max-profit",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-sensitive: `FIFO` is rejected.
impl FromStr for MatchStrategy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatchStrategy::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownStrategy(s.to_string()))
    }
}

/// Whether lots are pooled across accounts or kept per account.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MatchScope {
    /// One stream per instrument; transfers between accounts are ignored.
    #[default]
    Global,
    /// One stream per (account, instrument); transfers move lots.
    PerAccount,
}

impl MatchScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchScope::Global => "global",
            MatchScope::PerAccount => "per_account",
        }
    }
}

impl fmt::Display for MatchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchScope {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(MatchScope::Global),
            "per_account" => Ok(MatchScope::PerAccount),
            other => Err(ConfigurationError::UnknownScope(other.to_string())),
        }
    }
}
