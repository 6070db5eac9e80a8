use anyhow::Context;
use lotledger::output::{open_sink, write_audit_rows, write_notes, write_summaries};
use lotledger::{
    config::Config, AppError, CsvTransactionSource, JsonMarketDataSource, OutputFormat,
    PortfolioAggregator, PortfolioReport,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; stdout is reserved for output documents
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = Config::from_env().context("loading configuration")?;

    let report = run(&config).await.with_context(|| {
        format!(
            "processing transactions from {}",
            config.transactions_path.display()
        )
    })?;

    let excluded = report.notes.iter().filter(|n| n.is_exclusion()).count();
    tracing::info!(
        groups = report.groups.len(),
        notes = report.notes.len(),
        excluded,
        digest = %report.digest(),
        "run complete"
    );

    Ok(())
}

async fn run(config: &Config) -> Result<PortfolioReport, AppError> {
    let transactions = CsvTransactionSource::new(config.transactions_path.clone());
    let market = match &config.market_data_path {
        Some(path) => JsonMarketDataSource::load(path).await?,
        None => {
            tracing::info!("MARKET_DATA_PATH not set; market data unavailable");
            JsonMarketDataSource::empty()
        }
    };

    let report = PortfolioAggregator::new(config.grouping, config.as_of)
        .with_parallel(config.parallel_groups)
        .run(&transactions, &market)
        .await?;

    let audit_sink = open_sink(config.audit_output_path.as_deref())?;
    write_audit_rows(audit_sink, config.output_format, &report.groups)?;

    let summary_sink = open_sink(config.summary_output_path.as_deref())?;
    write_summaries(summary_sink, config.output_format, &report)?;

    // JSON summaries already embed the notes.
    if config.output_format == OutputFormat::Csv || config.notes_output_path.is_some() {
        let notes_sink = open_sink(config.notes_output_path.as_deref())?;
        write_notes(notes_sink, config.output_format, &report.notes)?;
    }

    Ok(report)
}
