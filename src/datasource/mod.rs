//! Source abstractions for the two external collaborators: where transactions
//! come from, and where market/reference data comes from.

use crate::domain::{BenchmarkLevels, Instrument, MarketSnapshot, RawTransaction};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod csv_transactions;
pub mod market_file;
pub mod mock;

pub use csv_transactions::CsvTransactionSource;
pub use market_file::{JsonMarketDataSource, MarketDataFile};
pub use mock::MockDataSource;

/// One row as read from a transaction source, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// Zero-based position of the row in the source.
    pub seq: u64,
    /// The raw fields, or why the row could not be read at all.
    pub record: Result<RawTransaction, String>,
}

/// Transaction source: supplies every row for a run in one call.
///
/// Row-level read problems belong in [`SourceRow::record`]; an `Err` from
/// [`TransactionSource::fetch_transactions`] means the source as a whole is
/// unusable and aborts the run.
#[async_trait]
pub trait TransactionSource: Send + Sync + fmt::Debug {
    async fn fetch_transactions(&self) -> Result<Vec<SourceRow>, SourceError>;
}

/// Market/reference data source.
///
/// Implementations own their retry/timeout policy. Errors are downgraded to
/// "unavailable" by the aggregator and never abort a run.
#[async_trait]
pub trait MarketDataSource: Send + Sync + fmt::Debug {
    /// Snapshot for one instrument, or `None` when the source has nothing.
    async fn fetch_snapshot(
        &self,
        instrument: &Instrument,
    ) -> Result<Option<MarketSnapshot>, SourceError>;

    /// Benchmark index levels for the run.
    async fn fetch_benchmarks(&self) -> Result<BenchmarkLevels, SourceError>;
}

/// Error type for source operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The underlying file or stream could not be read.
    #[error("I/O error: {0}")]
    Io(String),
    /// CSV structure could not be decoded (e.g., unreadable header).
    #[error("CSV error: {0}")]
    Csv(String),
    /// Payload decoded but does not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
    /// Data temporarily unobtainable (timeouts, rate limits upstream).
    #[error("Unavailable: {0}")]
    Unavailable(String),
}
