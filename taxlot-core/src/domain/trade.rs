//! Trade: one canonical transaction line in the ledger.

use super::ids::{InstrumentKey, TradeHash};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the trade does to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TradeAction {
    Open,
    Close,
    Transfer,
    Unknown,
}

impl TradeAction {
    /// Derive the action from a broker status code such as `O`, `C;P` or `Ca`.
    ///
    /// Open-family tokens are checked first because `Ca` (cancelled-and-reopened)
    /// also contains the close marker.
    pub fn from_code(code: &str) -> Self {
        if code.contains('O') || code.contains("Ca") {
            TradeAction::Open
        } else if code.contains('C') {
            TradeAction::Close
        } else {
            TradeAction::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Open => "Open",
            TradeAction::Close => "Close",
            TradeAction::Transfer => "Transfer",
            TradeAction::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(TradeAction::Open),
            "Close" => Ok(TradeAction::Close),
            "Transfer" => Ok(TradeAction::Transfer),
            "Unknown" => Ok(TradeAction::Unknown),
            other => Err(format!("unknown trade action '{other}'")),
        }
    }
}

/// Which side of the book the trade belongs to.
///
/// `Spinoff` and `Acquisition` mark synthetic trades generated from
/// corporate actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TradeType {
    Long,
    Short,
    In,
    Out,
    Spinoff,
    Acquisition,
}

impl TradeType {
    /// Derive the type from action and signed quantity.
    ///
    /// A long is opened by buying and closed by selling; a short is opened by
    /// selling and closed by buying. Zero or missing quantity has no type.
    pub fn derive(action: TradeAction, quantity: Option<f64>) -> Option<Self> {
        let q = quantity?;
        if q == 0.0 || q.is_nan() {
            return None;
        }
        if action == TradeAction::Transfer {
            return Some(if q > 0.0 { TradeType::In } else { TradeType::Out });
        }
        if (action == TradeAction::Close && q < 0.0) || (action == TradeAction::Open && q > 0.0) {
            Some(TradeType::Long)
        } else {
            Some(TradeType::Short)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Long => "Long",
            TradeType::Short => "Short",
            TradeType::In => "In",
            TradeType::Out => "Out",
            TradeType::Spinoff => "Spinoff",
            TradeType::Acquisition => "Acquisition",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Long" => Ok(TradeType::Long),
            "Short" => Ok(TradeType::Short),
            "In" => Ok(TradeType::In),
            "Out" => Ok(TradeType::Out),
            "Spinoff" => Ok(TradeType::Spinoff),
            "Acquisition" => Ok(TradeType::Acquisition),
            other => Err(format!("unknown trade type '{other}'")),
        }
    }
}

/// A canonical trade.
///
/// Source fields (`raw_symbol` .. `manual`) are fixed at normalization and
/// feed the identity hash. Derived fields (`ticker`, `quantity`, `price`,
/// `split_ratio`, both accumulated quantities) are recomputed wholesale on
/// every recompute pass from the `orig_*` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Identity ──
    pub hash: TradeHash,

    // ── Source fields ──
    pub raw_symbol: String,
    pub display_suffix: String,
    pub account: String,
    pub currency: String,
    pub timestamp: NaiveDateTime,
    pub orig_quantity: Option<f64>,
    pub orig_price: Option<f64>,
    pub proceeds: Option<f64>,
    pub commission: Option<f64>,
    pub basis: Option<f64>,
    /// Broker-reported P/L, informational only.
    pub realized_pnl: Option<f64>,
    pub action: TradeAction,
    pub trade_type: Option<TradeType>,
    /// Counter-account for transfers.
    pub target: Option<String>,
    pub manual: bool,

    // ── Derived fields ──
    pub ticker: String,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub split_ratio: f64,
    pub accumulated_quantity: f64,
    pub account_accumulated_quantity: f64,
}

impl Trade {
    /// A trade from the handful of fields a user enters by hand.
    ///
    /// Proceeds are `-quantity * price`, the type is derived and derived
    /// fields start un-adjusted. The hash is empty until the trade passes
    /// through [`crate::normalize::finalize_trade`].
    pub fn new(
        raw_symbol: impl Into<String>,
        account: impl Into<String>,
        currency: impl Into<String>,
        timestamp: NaiveDateTime,
        quantity: f64,
        price: f64,
        action: TradeAction,
    ) -> Self {
        let raw_symbol = raw_symbol.into();
        Self {
            hash: TradeHash::from_hex(""),
            ticker: raw_symbol.clone(),
            raw_symbol,
            display_suffix: String::new(),
            account: account.into(),
            currency: currency.into(),
            timestamp,
            orig_quantity: Some(quantity),
            orig_price: Some(price),
            proceeds: Some(-quantity * price),
            commission: None,
            basis: None,
            realized_pnl: None,
            action,
            trade_type: TradeType::derive(action, Some(quantity)),
            target: None,
            manual: false,
            quantity: Some(quantity),
            price: Some(price),
            split_ratio: 1.0,
            accumulated_quantity: 0.0,
            account_accumulated_quantity: 0.0,
        }
    }

    pub fn with_commission(mut self, commission: f64) -> Self {
        self.commission = Some(commission);
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.display_suffix = suffix.into();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn instrument(&self) -> InstrumentKey {
        InstrumentKey::new(self.ticker.clone(), self.display_suffix.clone())
    }

    pub fn display_name(&self) -> String {
        format!("{}{}", self.ticker, self.display_suffix)
    }

    /// Split-adjusted signed quantity, zero when missing.
    pub fn qty(&self) -> f64 {
        self.quantity.unwrap_or(0.0)
    }

    /// Split-adjusted price, zero when missing.
    pub fn px(&self) -> f64 {
        self.price.unwrap_or(0.0)
    }

    /// Magnitude of the fee charged for the whole trade.
    pub fn fee(&self) -> f64 {
        self.commission.map(f64::abs).unwrap_or(0.0)
    }

    pub fn is_close(&self) -> bool {
        self.action == TradeAction::Close
    }

    pub fn year(&self) -> i32 {
        use chrono::Datelike;
        self.timestamp.year()
    }

    /// Reset derived fields to their un-adjusted values.
    pub fn reset_derived(&mut self) {
        self.split_ratio = 1.0;
        self.quantity = self.orig_quantity;
        self.price = self.orig_price;
    }
}
