use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;

use super::grouping::{group_transactions, validate_rows, GroupKey, Grouping};
use super::summary::{apply_position_weights, build_summary, InstrumentSummary};
use crate::datasource::{MarketDataSource, SourceError, SourceRow, TransactionSource};
use crate::domain::{
    BenchmarkLevels, Instrument, MarketSnapshot, NoteKind, ProcessingNote, Transaction,
};
use crate::engine::{ProcessorOutput, TransactionProcessor};

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("group worker failed: {0}")]
    Worker(String),
}

/// Result of one portfolio run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioReport {
    pub as_of: NaiveDate,
    pub summaries: Vec<InstrumentSummary>,
    #[serde(skip)]
    pub groups: Vec<ProcessorOutput>,
    pub benchmarks: BenchmarkLevels,
    /// Every exclusion, skip, partial fill and missing-data event of the run.
    pub notes: Vec<ProcessingNote>,
}

impl PortfolioReport {
    pub fn group(&self, key: &GroupKey) -> Option<&ProcessorOutput> {
        self.groups
            .iter()
            .find(|g| g.instrument == key.instrument && g.owner == key.owner)
    }

    pub fn summary(&self, key: &GroupKey) -> Option<&InstrumentSummary> {
        self.summaries
            .iter()
            .find(|s| s.instrument == key.instrument && s.owner == key.owner)
    }

    /// Every group for `instrument`, one per owner when grouped by owner.
    pub fn groups_for<'a>(
        &'a self,
        instrument: &'a Instrument,
    ) -> impl Iterator<Item = &'a ProcessorOutput> + 'a {
        self.groups.iter().filter(move |g| &g.instrument == instrument)
    }

    /// Hex SHA-256 over every group's digest, in group order.
    pub fn digest(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        for group in &self.groups {
            hasher.update(group.digest().as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// Groups transactions, runs one processor per group and merges the results
/// with market data.
#[derive(Debug, Clone)]
pub struct PortfolioAggregator {
    grouping: Grouping,
    parallel: bool,
    as_of: NaiveDate,
}

impl PortfolioAggregator {
    pub fn new(grouping: Grouping, as_of: NaiveDate) -> Self {
        Self {
            grouping,
            parallel: true,
            as_of,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Fetch from both collaborators and aggregate.
    ///
    /// # Errors
    /// Only a transaction source that cannot be read at all, or a failed
    /// worker, aborts the run.
    pub async fn run(
        &self,
        transactions: &dyn TransactionSource,
        market: &dyn MarketDataSource,
    ) -> Result<PortfolioReport, AggregationError> {
        let rows = transactions.fetch_transactions().await?;
        self.aggregate(rows, market).await
    }

    pub async fn aggregate(
        &self,
        rows: Vec<SourceRow>,
        market: &dyn MarketDataSource,
    ) -> Result<PortfolioReport, AggregationError> {
        let batch = validate_rows(rows);
        let mut notes = batch.notes;

        let groups = group_transactions(batch.transactions, self.grouping);
        tracing::debug!(groups = groups.len(), parallel = self.parallel, "processing groups");

        let outputs = if self.parallel {
            Self::process_parallel(groups).await?
        } else {
            Self::process_sequential(groups)
        };

        for output in &outputs {
            notes.extend(output.notes.iter().cloned());
        }

        let (snapshots, market_notes) = Self::fetch_market_data(&outputs, market).await;
        notes.extend(market_notes);

        let benchmarks = match market.fetch_benchmarks().await {
            Ok(levels) => levels,
            Err(err) => {
                tracing::warn!(error = %err, "benchmark levels unavailable");
                notes.push(ProcessingNote::new(NoteKind::MarketDataUnavailable {
                    reason: format!("benchmarks: {}", err),
                }));
                BenchmarkLevels::default()
            }
        };

        let mut summaries: Vec<InstrumentSummary> = outputs
            .iter()
            .map(|output| {
                let snapshot = snapshots.get(&output.instrument).and_then(Option::as_ref);
                build_summary(output, snapshot, &benchmarks, self.as_of)
            })
            .collect();
        apply_position_weights(&mut summaries);

        tracing::info!(
            groups = outputs.len(),
            audit_rows = outputs.iter().map(|o| o.audit_rows.len()).sum::<usize>(),
            notes = notes.len(),
            "portfolio aggregated"
        );

        Ok(PortfolioReport {
            as_of: self.as_of,
            summaries,
            groups: outputs,
            benchmarks,
            notes,
        })
    }

    /// Run every group on the calling thread, in key order.
    pub fn process_sequential(groups: BTreeMap<GroupKey, Vec<Transaction>>) -> Vec<ProcessorOutput> {
        groups
            .into_iter()
            .map(|(key, txs)| Self::process_group(key, txs))
            .collect()
    }

    /// Run every group on its own blocking worker; results keep key order.
    pub async fn process_parallel(
        groups: BTreeMap<GroupKey, Vec<Transaction>>,
    ) -> Result<Vec<ProcessorOutput>, AggregationError> {
        let handles = groups.into_iter().map(|(key, txs)| {
            tokio::task::spawn_blocking(move || Self::process_group(key, txs))
        });

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.map_err(|e| AggregationError::Worker(e.to_string())))
            .collect()
    }

    fn process_group(key: GroupKey, txs: Vec<Transaction>) -> ProcessorOutput {
        let output = TransactionProcessor::run(key.instrument.clone(), key.owner.clone(), &txs);
        tracing::debug!(
            group = %key,
            transactions = txs.len(),
            audit_rows = output.audit_rows.len(),
            open_quantity = %output.aggregate.open_quantity,
            "group processed"
        );
        output
    }

    /// One snapshot lookup per distinct instrument. Failures become notes.
    async fn fetch_market_data(
        outputs: &[ProcessorOutput],
        market: &dyn MarketDataSource,
    ) -> (HashMap<Instrument, Option<MarketSnapshot>>, Vec<ProcessingNote>) {
        let instruments: BTreeSet<&Instrument> = outputs.iter().map(|o| &o.instrument).collect();

        let fetched = join_all(instruments.iter().map(|instrument| async move {
            (*instrument, market.fetch_snapshot(instrument).await)
        }))
        .await;

        let mut snapshots = HashMap::new();
        let mut notes = Vec::new();
        for (instrument, result) in fetched {
            let snapshot = match result {
                Ok(Some(snapshot)) => Some(snapshot),
                Ok(None) => {
                    tracing::debug!(%instrument, "no market snapshot");
                    notes.push(
                        ProcessingNote::new(NoteKind::MarketDataUnavailable {
                            reason: "no snapshot".to_string(),
                        })
                        .for_instrument(instrument.clone()),
                    );
                    None
                }
                Err(err) => {
                    tracing::warn!(%instrument, error = %err, "market data unavailable");
                    notes.push(
                        ProcessingNote::new(NoteKind::MarketDataUnavailable {
                            reason: err.to_string(),
                        })
                        .for_instrument(instrument.clone()),
                    );
                    None
                }
            };
            snapshots.insert(instrument.clone(), snapshot);
        }

        (snapshots, notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MockDataSource;
    use crate::domain::Decimal;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn key(symbol: &str) -> GroupKey {
        GroupKey::pooled(Instrument::new(symbol))
    }

    #[tokio::test]
    async fn test_parallel_and_sequential_agree() {
        let source = MockDataSource::new()
            .with_row("AAPL", "2024-01-01", "buy", "10", "100")
            .with_row("MSFT", "2024-01-01", "buy", "5", "300")
            .with_row("AAPL", "2024-02-01", "sell", "4", "120");

        let parallel = PortfolioAggregator::new(Grouping::Instrument, as_of())
            .run(&source, &source)
            .await
            .unwrap();
        let sequential = PortfolioAggregator::new(Grouping::Instrument, as_of())
            .with_parallel(false)
            .run(&source, &source)
            .await
            .unwrap();

        assert_eq!(parallel.groups, sequential.groups);
        assert_eq!(parallel.summaries, sequential.summaries);
    }

    #[tokio::test]
    async fn test_market_failure_is_a_note_not_an_error() {
        let source = MockDataSource::new()
            .with_row("AAPL", "2024-01-01", "buy", "10", "100")
            .with_failing_snapshot("AAPL")
            .with_failing_benchmarks();

        let report = PortfolioAggregator::new(Grouping::Instrument, as_of())
            .run(&source, &source)
            .await
            .unwrap();

        let summary = report.summary(&key("AAPL")).unwrap();
        assert_eq!(summary.current_price, None);
        assert_eq!(summary.unrealized_gain_loss, Decimal::zero());
        assert_eq!(summary.open_quantity, d("10"));

        let unavailable = report
            .notes
            .iter()
            .filter(|n| matches!(n.kind, NoteKind::MarketDataUnavailable { .. }))
            .count();
        assert_eq!(unavailable, 2);
    }

    #[tokio::test]
    async fn test_position_weights_across_groups() {
        let source = MockDataSource::new()
            .with_row("AAPL", "2024-01-01", "buy", "1", "100")
            .with_row("MSFT", "2024-01-01", "buy", "1", "300");

        let report = PortfolioAggregator::new(Grouping::Instrument, as_of())
            .run(&source, &source)
            .await
            .unwrap();

        let aapl = report.summary(&key("AAPL")).unwrap();
        let msft = report.summary(&key("MSFT")).unwrap();
        assert_eq!(aapl.position_weight, d("0.25"));
        assert_eq!(msft.position_weight, d("0.75"));
    }
}
