//! Domain types and determinism layer for the lot ledger.
//!
//! This module provides:
//! - Exact numeric handling via the Decimal wrapper
//! - Domain primitives: Instrument, Owner, TradeTime, Action
//! - Raw and validated transactions with stable keys
//! - Stable transaction ordering helper for deterministic processing
//! - Output records (audit rows) and processing notes
//! - Market reference data passed through from external collaborators

pub mod audit;
pub mod decimal;
pub mod market;
pub mod ordering;
pub mod primitives;
pub mod report;
pub mod transaction;

pub use audit::{AuditRow, TradeSide};
pub use decimal::Decimal;
pub use market::{BenchmarkLevels, Fundamentals, MarketSnapshot};
pub use ordering::{sort_transactions_deterministic, TransactionOrderingKey};
pub use primitives::{Action, Instrument, Owner, TradeTime, TradeTimeParseError};
pub use report::{NoteKind, ProcessingNote};
pub use transaction::{RawTransaction, Transaction, TransactionParseError};
