//! Taxlot Core: trade ledger, corporate actions, reconciliation and tax-lot matching.
//!
//! This crate contains the ledger engine:
//! - Domain types (trades, corporate actions, symbol renames, snapshots)
//! - Content-addressed trade identity (BLAKE3 fingerprint)
//! - Normalization of adapter frames into canonical trades
//! - Idempotent ledger merge with pairing invalidation
//! - Retroactive split and rename adjustment
//! - Position reconciliation with data-quality detectors
//! - Lot matching under fifo, lifo, average-cost, max-loss and max-profit

pub mod corporate_actions;
pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod ledger;
pub mod matching;
pub mod normalize;
pub mod reconcile;
pub mod renames;

pub use error::{ConfigurationError, FormatError, MissingAccountError, NormalizeError};
pub use ledger::{merge, recompute, Ledger};
pub use matching::{match_trades, MatchResult, MatchScope, MatchStrategy, Pair};
pub use reconcile::DataQualityWarning;
