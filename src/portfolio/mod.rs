//! Portfolio aggregation: validation, grouping, per-group processing and the
//! merge with external market data.
//!
//! This is the only layer where several instruments meet; the engine below
//! it never holds cross-instrument state.

pub mod aggregator;
pub mod grouping;
pub mod summary;

pub use aggregator::{AggregationError, PortfolioAggregator, PortfolioReport};
pub use grouping::{group_transactions, validate_rows, GroupKey, Grouping, ValidatedBatch};
pub use summary::{
    apply_position_weights, build_summary, position_weights, unrealized_gain_loss,
    InstrumentSummary,
};
