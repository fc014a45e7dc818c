//! Domain types for the trade ledger.

pub mod corporate_action;
pub mod ids;
pub mod records;
pub mod rename;
pub mod trade;

pub use corporate_action::{CorporateAction, CorporateActionKind};
pub use ids::{Epoch, InstrumentKey, TradeHash};
pub use records::{Dividend, ImportRecord, PositionSnapshot};
pub use rename::{RenameHistoryRow, SymbolRename};
pub use trade::{Trade, TradeAction, TradeType};

/// Timestamp format used for persisted ledgers.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Quantities closer to zero than this are treated as zero.
pub const QUANTITY_EPSILON: f64 = 1e-9;
