use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::datasource::SourceRow;
use crate::domain::{
    sort_transactions_deterministic, Instrument, NoteKind, Owner, ProcessingNote, Transaction,
};

/// How transactions are partitioned into independent lot queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// One queue per instrument, owners pooled.
    #[default]
    Instrument,
    /// One queue per (instrument, owner).
    InstrumentAndOwner,
}

/// Identity of one processing group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub instrument: Instrument,
    pub owner: Option<Owner>,
}

impl GroupKey {
    /// Key of a group that pools every owner.
    pub fn pooled(instrument: Instrument) -> Self {
        Self {
            instrument,
            owner: None,
        }
    }

    /// Key of one owner's group under [`Grouping::InstrumentAndOwner`].
    pub fn owned(instrument: Instrument, owner: Owner) -> Self {
        Self {
            instrument,
            owner: Some(owner),
        }
    }

    pub fn for_transaction(tx: &Transaction, grouping: Grouping) -> Self {
        let owner = match grouping {
            Grouping::Instrument => None,
            Grouping::InstrumentAndOwner => tx.owner.clone(),
        };
        Self {
            instrument: tx.instrument.clone(),
            owner,
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}/{}", self.instrument, owner),
            None => write!(f, "{}", self.instrument),
        }
    }
}

/// Transactions that passed validation, plus a note for each row that did not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedBatch {
    pub transactions: Vec<Transaction>,
    pub notes: Vec<ProcessingNote>,
}

/// Validate raw source rows, excluding and reporting malformed ones.
pub fn validate_rows(rows: Vec<SourceRow>) -> ValidatedBatch {
    let mut batch = ValidatedBatch::default();

    for row in rows {
        let raw = match row.record {
            Ok(raw) => raw,
            Err(reason) => {
                tracing::warn!(seq = row.seq, %reason, "unreadable transaction row excluded");
                batch
                    .notes
                    .push(ProcessingNote::new(NoteKind::Malformed { reason }).at_seq(row.seq));
                continue;
            }
        };

        match Transaction::parse(&raw, row.seq) {
            Ok(tx) => batch.transactions.push(tx),
            Err(err) => {
                tracing::warn!(seq = row.seq, error = %err, "malformed transaction excluded");
                let mut note = ProcessingNote::new(NoteKind::Malformed {
                    reason: err.to_string(),
                })
                .at_seq(row.seq);
                if let Some(symbol) = raw.instrument.as_deref().filter(|s| !s.trim().is_empty()) {
                    note = note.for_instrument(Instrument::new(symbol));
                }
                batch.notes.push(note);
            }
        }
    }

    batch
}

/// Partition transactions into groups, each sorted by (timestamp, seq).
pub fn group_transactions(
    transactions: Vec<Transaction>,
    grouping: Grouping,
) -> BTreeMap<GroupKey, Vec<Transaction>> {
    let mut groups: BTreeMap<GroupKey, Vec<Transaction>> = BTreeMap::new();
    for tx in transactions {
        groups
            .entry(GroupKey::for_transaction(&tx, grouping))
            .or_default()
            .push(tx);
    }
    for txs in groups.values_mut() {
        sort_transactions_deterministic(txs);
    }
    groups
}
