use std::io::Write;

use chrono::NaiveDate;
use lotledger::datasource::{JsonMarketDataSource, MarketDataSource, SourceError};
use lotledger::output::{write_audit_rows, write_notes, write_summaries};
use lotledger::portfolio::AggregationError;
use lotledger::{
    CsvTransactionSource, Decimal, GroupKey, Grouping, Instrument, NoteKind, OutputFormat,
    PortfolioAggregator, TransactionSource,
};
use tempfile::NamedTempFile;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn pooled(symbol: &str) -> GroupKey {
    GroupKey::pooled(Instrument::new(symbol))
}

fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const TRANSACTIONS: &str = "\
id,ticker,date,trade_type,qty,price,sale_price,platform,created_by
1,aapl,2024-01-02,Buy,10,1,,Robinhood,alice
2,AAPL,2024-01-03,buy,10,2,,Fidelity,alice
3,AAPL,2024-01-04,sell,15,0,3,Robinhood,alice
4,MSFT,2024-01-05,hold,1,300,,Fidelity,bob
5,MSFT,2024-01-06,buy,abc,300,,Fidelity,bob
";

const MARKET: &str = r#"{
  "benchmarks": { "sp_500": 4742.83, "nasdaq": 14765.94 },
  "instruments": {
    "AAPL": { "current_price": "2.5", "sector": "Technology", "ema_50": 2.2 }
  }
}"#;

#[test]
fn test_fetch_from_csv_file() {
    let file = temp_file(TRANSACTIONS);
    let source = CsvTransactionSource::new(file.path());

    let rows = tokio_test::block_on(source.fetch_transactions()).unwrap();

    assert_eq!(rows.len(), 5);
    let first = rows[0].record.as_ref().unwrap();
    assert_eq!(first.id.as_deref(), Some("1"));
    assert_eq!(first.instrument.as_deref(), Some("aapl"));
    assert_eq!(first.platform.as_deref(), Some("Robinhood"));
    assert_eq!(rows[4].seq, 4);
}

#[test]
fn test_load_market_file() {
    let file = temp_file(MARKET);
    let market = tokio_test::block_on(JsonMarketDataSource::load(file.path())).unwrap();

    let snapshot = tokio_test::block_on(market.fetch_snapshot(&Instrument::new("aapl")))
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.current_price, Some(d("2.5")));
    assert_eq!(snapshot.sector.as_deref(), Some("Technology"));

    let missing = tokio_test::block_on(market.fetch_snapshot(&Instrument::new("MSFT"))).unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_missing_transaction_file_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = CsvTransactionSource::new(dir.path().join("absent.csv"));
    let market = JsonMarketDataSource::empty();

    let err = PortfolioAggregator::new(
        Grouping::Instrument,
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
    )
    .run(&source, &market)
    .await
    .unwrap_err();

    assert!(matches!(err, AggregationError::Source(SourceError::Io(_))));
}

#[tokio::test]
async fn test_csv_to_outputs_end_to_end() {
    let transactions = temp_file(TRANSACTIONS);
    let market_file = temp_file(MARKET);
    let source = CsvTransactionSource::new(transactions.path());
    let market = JsonMarketDataSource::load(market_file.path()).await.unwrap();

    let report = PortfolioAggregator::new(
        Grouping::Instrument,
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
    )
    .run(&source, &market)
    .await
    .unwrap();

    let aapl = report.summary(&pooled("AAPL")).unwrap();
    assert_eq!(aapl.realized_gain_total, d("25"));
    assert_eq!(aapl.open_quantity, d("5"));
    assert_eq!(aapl.average_cost, d("2"));
    assert_eq!(aapl.unrealized_gain_loss, d("2.5"));
    assert_eq!(aapl.platform.as_deref(), Some("Robinhood"));
    assert_eq!(aapl.sp_500, Some(4742.83));

    // MSFT saw only a skipped and a malformed row: a flat group.
    let msft = report.summary(&pooled("MSFT")).unwrap();
    assert_eq!(msft.open_quantity, Decimal::zero());
    assert_eq!(msft.first_buy_date, None);
    assert!(report
        .notes
        .iter()
        .any(|n| matches!(n.kind, NoteKind::UnrecognizedAction { .. }) && n.seq == Some(3)));
    assert!(report
        .notes
        .iter()
        .any(|n| matches!(n.kind, NoteKind::Malformed { .. }) && n.seq == Some(4)));

    let audit_out = NamedTempFile::new().unwrap();
    let summary_out = NamedTempFile::new().unwrap();
    write_audit_rows(
        audit_out.reopen().unwrap(),
        OutputFormat::Csv,
        &report.groups,
    )
    .unwrap();
    write_summaries(summary_out.reopen().unwrap(), OutputFormat::Csv, &report).unwrap();

    let audit_csv = std::fs::read_to_string(audit_out.path()).unwrap();
    assert_eq!(audit_csv.lines().count(), 4);
    assert!(audit_csv.contains("id:3"));

    let summary_csv = std::fs::read_to_string(summary_out.path()).unwrap();
    let mut lines = summary_csv.lines();
    assert!(lines
        .next()
        .unwrap()
        .starts_with("instrument,owner,platform,open_quantity,average_cost"));
    assert!(lines.next().unwrap().starts_with("AAPL,,Robinhood,5,2,"));
    assert!(lines.next().unwrap().starts_with("MSFT,,Fidelity,0,0,"));
    assert!(lines.next().is_none());

    let notes_out = NamedTempFile::new().unwrap();
    write_notes(notes_out.reopen().unwrap(), OutputFormat::Csv, &report.notes).unwrap();
    let notes_csv = std::fs::read_to_string(notes_out.path()).unwrap();
    assert_eq!(notes_csv.lines().count(), report.notes.len() + 1);
    assert!(notes_csv.starts_with("seq,tx_key,instrument,timestamp,kind,detail\n"));
    assert!(notes_csv.contains(",unrecognized_action,hold"));
    assert!(notes_csv.lines().any(|l| l.starts_with("4,") && l.contains(",malformed,")));
    assert!(notes_csv.contains("MSFT,,market_data_unavailable,no snapshot"));
}
