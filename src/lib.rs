pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod output;
pub mod portfolio;

pub use config::{Config, OutputFormat};
pub use datasource::{
    CsvTransactionSource, JsonMarketDataSource, MarketDataSource, MockDataSource, SourceError,
    TransactionSource,
};
pub use domain::{
    Action, AuditRow, Decimal, Instrument, NoteKind, Owner, ProcessingNote, TradeTime, Transaction,
};
pub use engine::{CostBasisTracker, LotQueue, ProcessorOutput, TransactionProcessor};
pub use error::AppError;
pub use portfolio::{GroupKey, Grouping, InstrumentSummary, PortfolioAggregator, PortfolioReport};
