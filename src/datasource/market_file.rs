//! Market data loaded from a JSON file prepared by an upstream fetcher.
//!
//! ```json
//! {
//!   "benchmarks": { "sp_500": 5123.4, "nasdaq": 16100.2 },
//!   "instruments": {
//!     "AAPL": { "current_price": "187.50", "ema_50": 181.2, "sector": "Technology" }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{MarketDataSource, SourceError};
use crate::domain::{BenchmarkLevels, Instrument, MarketSnapshot};

/// On-disk layout of a market data file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataFile {
    pub benchmarks: BenchmarkLevels,
    pub instruments: BTreeMap<String, MarketSnapshot>,
}

#[derive(Debug, Clone, Default)]
pub struct JsonMarketDataSource {
    benchmarks: BenchmarkLevels,
    snapshots: HashMap<Instrument, MarketSnapshot>,
}

impl JsonMarketDataSource {
    /// A source with no data at all: every figure is unavailable.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_file_data(data: MarketDataFile) -> Self {
        let snapshots = data
            .instruments
            .into_iter()
            .map(|(symbol, snapshot)| (Instrument::new(symbol), snapshot))
            .collect();
        Self {
            benchmarks: data.benchmarks,
            snapshots,
        }
    }

    pub fn from_slice(json: &[u8]) -> Result<Self, SourceError> {
        let data: MarketDataFile =
            serde_json::from_slice(json).map_err(|e| SourceError::Parse(e.to_string()))?;
        Ok(Self::from_file_data(data))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SourceError::Io(format!("{}: {}", path.display(), e)))?;
        let source = Self::from_slice(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            instruments = source.snapshots.len(),
            "loaded market data"
        );
        Ok(source)
    }
}

#[async_trait]
impl MarketDataSource for JsonMarketDataSource {
    async fn fetch_snapshot(
        &self,
        instrument: &Instrument,
    ) -> Result<Option<MarketSnapshot>, SourceError> {
        Ok(self.snapshots.get(instrument).cloned())
    }

    async fn fetch_benchmarks(&self) -> Result<BenchmarkLevels, SourceError> {
        Ok(self.benchmarks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal;

    #[tokio::test]
    async fn test_lookup_is_symbol_normalized() {
        let json = br#"{"instruments":{"aapl":{"current_price":"187.50"}}}"#;
        let source = JsonMarketDataSource::from_slice(json).unwrap();

        let snapshot = source
            .fetch_snapshot(&Instrument::new("AAPL"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            snapshot.current_price,
            Some(Decimal::from_str_canonical("187.5").unwrap())
        );
        assert!(source
            .fetch_snapshot(&Instrument::new("MSFT"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_benchmarks_pass_through() {
        let json = br#"{"benchmarks":{"sp_500":5123.4}}"#;
        let source = JsonMarketDataSource::from_slice(json).unwrap();
        let benchmarks = source.fetch_benchmarks().await.unwrap();
        assert_eq!(benchmarks.sp_500, Some(5123.4));
        assert_eq!(benchmarks.nasdaq, None);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = JsonMarketDataSource::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[tokio::test]
    async fn test_empty_source_has_nothing() {
        let source = JsonMarketDataSource::empty();
        assert_eq!(
            source.fetch_benchmarks().await.unwrap(),
            BenchmarkLevels::default()
        );
        assert!(source
            .fetch_snapshot(&Instrument::new("AAPL"))
            .await
            .unwrap()
            .is_none());
    }
}
