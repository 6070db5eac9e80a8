use thiserror::Error;

use crate::config::ConfigError;
use crate::datasource::SourceError;
use crate::output::OutputError;
use crate::portfolio::AggregationError;

/// Fatal run failures. Row-level problems never reach this type; they are
/// reported as notes and the run continues.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),
    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}
