//! Writers for the run outputs: audit rows, per-group summaries and the
//! processing notes.
//!
//! JSON output is pretty-printed; CSV output uses `\n` terminators so the
//! bytes are identical across platforms.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::config::OutputFormat;
use crate::domain::{AuditRow, BenchmarkLevels, Instrument, Owner, ProcessingNote};
use crate::engine::ProcessorOutput;
use crate::portfolio::{InstrumentSummary, PortfolioReport};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct AuditGroup<'a> {
    instrument: &'a Instrument,
    owner: &'a Option<Owner>,
    digest: String,
    audit_rows: &'a [AuditRow],
}

#[derive(Serialize)]
struct SummaryDocument<'a> {
    as_of: chrono::NaiveDate,
    digest: String,
    benchmarks: &'a BenchmarkLevels,
    summaries: &'a [InstrumentSummary],
    notes: &'a [ProcessingNote],
}

/// A note flattened to fixed columns for CSV.
#[derive(Serialize)]
struct NoteRecord<'a> {
    seq: Option<u64>,
    tx_key: Option<&'a str>,
    instrument: Option<&'a Instrument>,
    timestamp: Option<String>,
    kind: &'static str,
    detail: String,
}

impl<'a> From<&'a ProcessingNote> for NoteRecord<'a> {
    fn from(note: &'a ProcessingNote) -> Self {
        Self {
            seq: note.seq,
            tx_key: note.tx_key.as_deref(),
            instrument: note.instrument.as_ref(),
            timestamp: note.timestamp.map(|t| t.to_string()),
            kind: note.kind.label(),
            detail: note.kind.detail(),
        }
    }
}

fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer)
}

/// Write every group's audit rows, groups in key order and rows in
/// processing order.
///
/// CSV output is one flat table; JSON output keeps rows nested per group
/// alongside that group's digest.
pub fn write_audit_rows<W: Write>(
    writer: W,
    format: OutputFormat,
    groups: &[ProcessorOutput],
) -> Result<(), OutputError> {
    match format {
        OutputFormat::Json => {
            let doc: Vec<AuditGroup<'_>> = groups
                .iter()
                .map(|g| AuditGroup {
                    instrument: &g.instrument,
                    owner: &g.owner,
                    digest: g.digest(),
                    audit_rows: &g.audit_rows,
                })
                .collect();
            write_json(writer, &doc)
        }
        OutputFormat::Csv => {
            let mut csv = csv_writer(writer);
            for row in groups.iter().flat_map(|g| g.audit_rows.iter()) {
                csv.serialize(row)?;
            }
            csv.flush()?;
            Ok(())
        }
    }
}

/// Write the per-group summaries.
///
/// JSON output also carries the run digest, benchmark levels and the note
/// list; CSV output holds one summary per line.
pub fn write_summaries<W: Write>(
    writer: W,
    format: OutputFormat,
    report: &PortfolioReport,
) -> Result<(), OutputError> {
    match format {
        OutputFormat::Json => write_json(
            writer,
            &SummaryDocument {
                as_of: report.as_of,
                digest: report.digest(),
                benchmarks: &report.benchmarks,
                summaries: &report.summaries,
                notes: &report.notes,
            },
        ),
        OutputFormat::Csv => {
            let mut csv = csv_writer(writer);
            for summary in &report.summaries {
                csv.serialize(summary)?;
            }
            csv.flush()?;
            Ok(())
        }
    }
}

/// Write the processing notes in report order.
///
/// JSON output is the tagged note list; CSV output is one note per line
/// under `seq,tx_key,instrument,timestamp,kind,detail`.
pub fn write_notes<W: Write>(
    writer: W,
    format: OutputFormat,
    notes: &[ProcessingNote],
) -> Result<(), OutputError> {
    match format {
        OutputFormat::Json => write_json(writer, notes),
        OutputFormat::Csv => {
            let mut csv = csv_writer(writer);
            if notes.is_empty() {
                csv.write_record(["seq", "tx_key", "instrument", "timestamp", "kind", "detail"])?;
            }
            for note in notes {
                csv.serialize(NoteRecord::from(note))?;
            }
            csv.flush()?;
            Ok(())
        }
    }
}

fn write_json<W: Write, T: Serialize + ?Sized>(mut writer: W, value: &T) -> Result<(), OutputError> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Open `path` for writing, or stdout when no path is configured.
pub fn open_sink(path: Option<&Path>) -> Result<Box<dyn Write>, OutputError> {
    match path {
        Some(path) => Ok(Box::new(BufWriter::new(File::create(path)?))),
        None => Ok(Box::new(io::stdout().lock())),
    }
}
