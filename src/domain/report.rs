//! Processing notes: everything that was excluded, skipped, or only partly
//! handled during a run.

use crate::domain::{Decimal, Instrument, TradeTime};
use serde::{Deserialize, Serialize};

/// What happened to an input that did not flow through cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoteKind {
    /// Row could not be read or validated; excluded.
    Malformed { reason: String },
    /// Action was neither buy nor sell; excluded.
    UnrecognizedAction { action: String },
    /// Buy or sell of zero units; no-op, no audit row.
    ZeroQuantity { action: String },
    /// Sell with no open lots; no audit row.
    NothingToSell { requested: Decimal },
    /// Sell exceeded open lots; the audit row covers `matched` only.
    PartialFill {
        requested: Decimal,
        matched: Decimal,
        shortfall: Decimal,
    },
    /// A figure derived from the row does not fit in a decimal; excluded.
    Overflow { action: String, reason: String },
    /// External market data could not be obtained for the instrument.
    MarketDataUnavailable { reason: String },
}

impl NoteKind {
    /// The serialized `kind` tag.
    pub fn label(&self) -> &'static str {
        match self {
            NoteKind::Malformed { .. } => "malformed",
            NoteKind::UnrecognizedAction { .. } => "unrecognized_action",
            NoteKind::ZeroQuantity { .. } => "zero_quantity",
            NoteKind::NothingToSell { .. } => "nothing_to_sell",
            NoteKind::PartialFill { .. } => "partial_fill",
            NoteKind::Overflow { .. } => "overflow",
            NoteKind::MarketDataUnavailable { .. } => "market_data_unavailable",
        }
    }

    /// The variant's fields as one line of text, for flat outputs.
    pub fn detail(&self) -> String {
        match self {
            NoteKind::Malformed { reason } | NoteKind::MarketDataUnavailable { reason } => {
                reason.clone()
            }
            NoteKind::UnrecognizedAction { action } | NoteKind::ZeroQuantity { action } => {
                action.clone()
            }
            NoteKind::NothingToSell { requested } => format!("requested {}", requested),
            NoteKind::PartialFill {
                requested,
                matched,
                shortfall,
            } => format!(
                "requested {}, matched {}, shortfall {}",
                requested, matched, shortfall
            ),
            NoteKind::Overflow { action, reason } => format!("{}: {}", action, reason),
        }
    }
}

/// A single report entry, located as precisely as the input allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingNote {
    /// Input sequence number of the offending row, when row-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument: Option<Instrument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<TradeTime>,
    #[serde(flatten)]
    pub kind: NoteKind,
}

impl ProcessingNote {
    pub fn new(kind: NoteKind) -> Self {
        Self {
            seq: None,
            tx_key: None,
            instrument: None,
            timestamp: None,
            kind,
        }
    }

    pub fn at_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn for_instrument(mut self, instrument: Instrument) -> Self {
        self.instrument = Some(instrument);
        self
    }

    /// Locate the note on a validated transaction.
    pub fn for_transaction(mut self, tx: &crate::domain::Transaction) -> Self {
        self.seq = Some(tx.seq);
        self.tx_key = Some(tx.tx_key.clone());
        self.instrument = Some(tx.instrument.clone());
        self.timestamp = Some(tx.timestamp);
        self
    }

    /// True for notes that mean an input row produced no audit row at all.
    pub fn is_exclusion(&self) -> bool {
        matches!(
            self.kind,
            NoteKind::Malformed { .. }
                | NoteKind::UnrecognizedAction { .. }
                | NoteKind::ZeroQuantity { .. }
                | NoteKind::NothingToSell { .. }
                | NoteKind::Overflow { .. }
        )
    }
}
