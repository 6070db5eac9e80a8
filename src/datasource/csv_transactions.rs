//! Reading transaction rows from a CSV file.
//!
//! Expected header (order free, extra columns ignored):
//! `id,instrument,owner,timestamp,action,quantity,price,sale_price,platform`.
//! The legacy column names `ticker`, `date`, `trade_type`, `created_by` and
//! `qty` are accepted as aliases.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{SourceError, SourceRow, TransactionSource};
use crate::domain::RawTransaction;

#[derive(Debug, Clone)]
pub struct CsvTransactionSource {
    path: PathBuf,
}

impl CsvTransactionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode CSV bytes into source rows.
    ///
    /// A record that cannot be decoded becomes a row-level error; only an
    /// unreadable header fails the whole batch.
    pub fn parse_csv(csv_bytes: &[u8]) -> Result<Vec<SourceRow>, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(csv_bytes);

        let headers = reader
            .headers()
            .map_err(|e| SourceError::Csv(e.to_string()))?
            .clone();

        let mut rows = Vec::new();
        for (seq, record) in reader.records().enumerate() {
            let record = record
                .map_err(|e| e.to_string())
                .and_then(|r| {
                    r.deserialize::<RawTransaction>(Some(&headers))
                        .map_err(|e| e.to_string())
                });
            rows.push(SourceRow {
                seq: seq as u64,
                record,
            });
        }

        Ok(rows)
    }
}

#[async_trait]
impl TransactionSource for CsvTransactionSource {
    async fn fetch_transactions(&self) -> Result<Vec<SourceRow>, SourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| SourceError::Io(format!("{}: {}", self.path.display(), e)))?;

        let rows = Self::parse_csv(&bytes)?;
        tracing::debug!(path = %self.path.display(), rows = rows.len(), "read transaction csv");
        Ok(rows)
    }
}
