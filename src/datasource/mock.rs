//! Mock data source for testing without files or network calls.

use std::collections::{HashMap, HashSet};

use super::{MarketDataSource, SourceError, SourceRow, TransactionSource};
use crate::domain::{BenchmarkLevels, Instrument, MarketSnapshot, RawTransaction};
use async_trait::async_trait;

/// Mock source that returns predefined rows and market data.
#[derive(Debug, Clone, Default)]
pub struct MockDataSource {
    rows: Vec<SourceRow>,
    snapshots: HashMap<Instrument, MarketSnapshot>,
    failing: HashSet<Instrument>,
    benchmarks: BenchmarkLevels,
    benchmarks_fail: bool,
}

impl MockDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw transaction row; its sequence number is its position.
    pub fn with_raw(mut self, raw: RawTransaction) -> Self {
        let seq = self.rows.len() as u64;
        self.rows.push(SourceRow {
            seq,
            record: Ok(raw),
        });
        self
    }

    /// Add a transaction row from plain fields.
    pub fn with_row(
        self,
        instrument: &str,
        timestamp: &str,
        action: &str,
        quantity: &str,
        price: &str,
    ) -> Self {
        self.with_raw(RawTransaction {
            instrument: Some(instrument.to_string()),
            timestamp: Some(timestamp.to_string()),
            action: Some(action.to_string()),
            quantity: Some(quantity.to_string()),
            price: Some(price.to_string()),
            ..Default::default()
        })
    }

    /// Add a row the source could not read at all.
    pub fn with_unreadable(mut self, reason: &str) -> Self {
        let seq = self.rows.len() as u64;
        self.rows.push(SourceRow {
            seq,
            record: Err(reason.to_string()),
        });
        self
    }

    pub fn with_snapshot(mut self, instrument: &str, snapshot: MarketSnapshot) -> Self {
        self.snapshots.insert(Instrument::new(instrument), snapshot);
        self
    }

    /// Make snapshot lookups for `instrument` fail as if the upstream timed out.
    pub fn with_failing_snapshot(mut self, instrument: &str) -> Self {
        self.failing.insert(Instrument::new(instrument));
        self
    }

    pub fn with_benchmarks(mut self, benchmarks: BenchmarkLevels) -> Self {
        self.benchmarks = benchmarks;
        self
    }

    pub fn with_failing_benchmarks(mut self) -> Self {
        self.benchmarks_fail = true;
        self
    }
}

#[async_trait]
impl TransactionSource for MockDataSource {
    async fn fetch_transactions(&self) -> Result<Vec<SourceRow>, SourceError> {
        Ok(self.rows.clone())
    }
}

#[async_trait]
impl MarketDataSource for MockDataSource {
    async fn fetch_snapshot(
        &self,
        instrument: &Instrument,
    ) -> Result<Option<MarketSnapshot>, SourceError> {
        if self.failing.contains(instrument) {
            return Err(SourceError::Unavailable(format!(
                "no quote for {}",
                instrument
            )));
        }
        Ok(self.snapshots.get(instrument).cloned())
    }

    async fn fetch_benchmarks(&self) -> Result<BenchmarkLevels, SourceError> {
        if self.benchmarks_fail {
            return Err(SourceError::Unavailable("benchmarks".to_string()));
        }
        Ok(self.benchmarks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal;

    #[tokio::test]
    async fn test_mock_rows_keep_input_order() {
        let mock = MockDataSource::new()
            .with_row("AAPL", "2024-01-01", "buy", "1", "10")
            .with_unreadable("bad utf-8")
            .with_row("MSFT", "2024-01-01", "buy", "1", "10");

        let rows = mock.fetch_transactions().await.unwrap();
        let seqs: Vec<u64> = rows.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert!(rows[1].record.is_err());
    }

    #[tokio::test]
    async fn test_mock_snapshot_and_failure() {
        let mock = MockDataSource::new()
            .with_snapshot(
                "AAPL",
                MarketSnapshot::with_price(Decimal::from(190)),
            )
            .with_failing_snapshot("MSFT");

        let snapshot = mock
            .fetch_snapshot(&Instrument::new("aapl"))
            .await
            .unwrap();
        assert_eq!(
            snapshot.and_then(|s| s.current_price),
            Some(Decimal::from(190))
        );

        let err = mock
            .fetch_snapshot(&Instrument::new("MSFT"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
