//! Repeated runs over the same input must produce identical bytes.

use chrono::NaiveDate;
use lotledger::datasource::MockDataSource;
use lotledger::output::{write_audit_rows, write_summaries};
use lotledger::{Grouping, OutputFormat, PortfolioAggregator, PortfolioReport};

fn fixture() -> MockDataSource {
    MockDataSource::new()
        .with_row("AAPL", "2024-01-02", "buy", "10", "185.64")
        .with_row("MSFT", "2024-01-02", "buy", "3", "370.87")
        .with_row("AAPL", "2024-01-02", "buy", "5", "185.10")
        .with_row("AAPL", "2024-02-15", "sell", "12", "183.86")
        .with_row("NVDA", "2024-03-01", "BUY", "2.5", "822.79")
        .with_row("MSFT", "2024-03-04", "sell", "5", "414.92")
        .with_row("NVDA", "2024-03-05", "dividend", "1", "0.04")
        .with_row("AAPL", "2024-04-01", "Sell", "3", "170.03")
}

async fn run(parallel: bool) -> PortfolioReport {
    let source = fixture();
    PortfolioAggregator::new(
        Grouping::Instrument,
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
    )
    .with_parallel(parallel)
    .run(&source, &source)
    .await
    .unwrap()
}

fn render(report: &PortfolioReport, format: OutputFormat) -> (Vec<u8>, Vec<u8>) {
    let mut audit = Vec::new();
    let mut summaries = Vec::new();
    write_audit_rows(&mut audit, format, &report.groups).unwrap();
    write_summaries(&mut summaries, format, report).unwrap();
    (audit, summaries)
}

#[tokio::test]
async fn test_repeated_runs_have_identical_digests() {
    let first = run(true).await;
    let second = run(true).await;

    assert_eq!(first.digest(), second.digest());
    for (a, b) in first.groups.iter().zip(&second.groups) {
        assert_eq!(a.digest(), b.digest());
    }
}

#[tokio::test]
async fn test_repeated_runs_render_identical_bytes() {
    let first = run(true).await;
    let second = run(true).await;

    for format in [OutputFormat::Json, OutputFormat::Csv] {
        assert_eq!(render(&first, format), render(&second, format));
    }
}

#[tokio::test]
async fn test_parallel_matches_sequential() {
    let parallel = run(true).await;
    let sequential = run(false).await;

    assert_eq!(parallel.digest(), sequential.digest());
    assert_eq!(parallel.summaries, sequential.summaries);
    assert_eq!(parallel.notes, sequential.notes);
}

#[tokio::test]
async fn test_same_timestamp_keeps_input_order() {
    let report = run(false).await;
    let aapl = &report.groups[0];

    // Both AAPL buys share a date; the earlier row must be the first lot
    // consumed, so the 12-unit sale takes all 10 @ 185.64 and 2 @ 185.10.
    let sale = &aapl.audit_rows[2];
    assert_eq!(
        sale.consumed_cost.map(|c| c.to_canonical_string()),
        Some("2226.6".to_string())
    );
}
