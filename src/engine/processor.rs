use serde::Serialize;
use thiserror::Error;

use crate::domain::{
    Action, AuditRow, Decimal, Instrument, NoteKind, Owner, ProcessingNote, TradeSide, TradeTime,
    Transaction,
};

use super::cost_basis::{CostBasisTracker, RunningAggregate};
use super::lot_queue::{Lot, LotError};

/// Lifecycle of a processor. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorState {
    Idle,
    Processing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    #[error("processor for {0} is done; no further transactions accepted")]
    AlreadyDone(Instrument),
}

/// An open lot as it stands at the end of processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenLot {
    pub acquired_at: TradeTime,
    pub original_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub unit_cost: Decimal,
}

impl From<&Lot> for OpenLot {
    fn from(lot: &Lot) -> Self {
        Self {
            acquired_at: lot.acquired_at(),
            original_quantity: lot.original_quantity(),
            remaining_quantity: lot.remaining_quantity(),
            unit_cost: lot.unit_cost(),
        }
    }
}

/// Everything one processor produced in its single pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessorOutput {
    pub instrument: Instrument,
    pub owner: Option<Owner>,
    pub aggregate: RunningAggregate,
    pub average_cost: Decimal,
    pub audit_rows: Vec<AuditRow>,
    pub open_lots: Vec<OpenLot>,
    pub notes: Vec<ProcessingNote>,
    /// Date of the first processed buy.
    pub first_buy: Option<TradeTime>,
    /// Platform of the first transaction seen.
    pub platform: Option<String>,
}

impl ProcessorOutput {
    /// Hex SHA-256 over the JSON-serialized audit rows and final aggregate.
    ///
    /// Identical inputs always give the same digest, so persisted results
    /// can be reconciled against a re-run.
    pub fn digest(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        for row in &self.audit_rows {
            // Serializing plain data structs cannot fail.
            let bytes = serde_json::to_vec(row).unwrap_or_default();
            hasher.update(&bytes);
            hasher.update(b"\n");
        }
        hasher.update(serde_json::to_vec(&self.aggregate).unwrap_or_default());
        hex::encode(hasher.finalize())
    }
}

/// Drives the FIFO matcher and cost-basis tracker across one ordered
/// transaction list for a single instrument (and owner).
///
/// A processor is used for exactly one pass: create it, feed it every
/// transaction in order, then call [`TransactionProcessor::into_output`].
pub struct TransactionProcessor {
    instrument: Instrument,
    owner: Option<Owner>,
    state: ProcessorState,
    tracker: CostBasisTracker,

    // Outputs accumulated during processing.
    audit_rows: Vec<AuditRow>,
    notes: Vec<ProcessingNote>,
    first_buy: Option<TradeTime>,
    platform: Option<String>,
}

impl TransactionProcessor {
    pub fn new(instrument: Instrument, owner: Option<Owner>) -> Self {
        Self {
            instrument,
            owner,
            state: ProcessorState::Idle,
            tracker: CostBasisTracker::new(),
            audit_rows: Vec::new(),
            notes: Vec::new(),
            first_buy: None,
            platform: None,
        }
    }

    /// Process an already ordered transaction list in one pass.
    pub fn run(
        instrument: Instrument,
        owner: Option<Owner>,
        transactions: &[Transaction],
    ) -> ProcessorOutput {
        let mut processor = Self::new(instrument, owner);
        for tx in transactions {
            processor.apply(tx);
        }
        processor.into_output()
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn aggregate(&self) -> RunningAggregate {
        self.tracker.aggregate()
    }

    pub fn audit_rows(&self) -> &[AuditRow] {
        &self.audit_rows
    }

    pub fn notes(&self) -> &[ProcessingNote] {
        &self.notes
    }

    /// Process a single transaction, returning the audit row it produced, if
    /// any. Skips are recorded as notes rather than returned as errors.
    ///
    /// # Errors
    /// Fails once the processor is [`ProcessorState::Done`].
    pub fn process(&mut self, tx: &Transaction) -> Result<Option<&AuditRow>, ProcessorError> {
        if self.state == ProcessorState::Done {
            return Err(ProcessorError::AlreadyDone(self.instrument.clone()));
        }
        let emitted = self.apply(tx);
        Ok(if emitted { self.audit_rows.last() } else { None })
    }

    /// Mark the input as exhausted. Idempotent.
    pub fn finish(&mut self) {
        self.state = ProcessorState::Done;
    }

    /// Finish and hand over the accumulated outputs.
    pub fn into_output(mut self) -> ProcessorOutput {
        self.finish();
        let aggregate = self.tracker.aggregate();
        ProcessorOutput {
            instrument: self.instrument,
            owner: self.owner,
            aggregate,
            average_cost: aggregate.average_cost(),
            audit_rows: self.audit_rows,
            open_lots: self.tracker.queue().lots().map(OpenLot::from).collect(),
            notes: self.notes,
            first_buy: self.first_buy,
            platform: self.platform,
        }
    }

    /// Process one transaction on a processor that is not done. Returns
    /// whether an audit row was emitted.
    fn apply(&mut self, tx: &Transaction) -> bool {
        self.state = ProcessorState::Processing;

        if self.platform.is_none() {
            self.platform = tx.platform.clone();
        }

        match &tx.action {
            Action::Buy => self.handle_buy(tx),
            Action::Sell => self.handle_sell(tx),
            Action::Unrecognized(action) => {
                tracing::warn!(
                    instrument = %tx.instrument,
                    seq = tx.seq,
                    action = %action,
                    "skipping transaction with unrecognized action"
                );
                self.note(
                    tx,
                    NoteKind::UnrecognizedAction {
                        action: action.clone(),
                    },
                );
                false
            }
        }
    }

    fn handle_buy(&mut self, tx: &Transaction) -> bool {
        let purchase_cost = match self.tracker.buy(tx.timestamp, tx.quantity, tx.price) {
            Ok(cost) => cost,
            Err(err) => {
                self.reject(tx, "buy", err);
                return false;
            }
        };

        if self.first_buy.is_none() {
            self.first_buy = Some(tx.timestamp);
        }

        let mut row = self.base_row(tx, TradeSide::Buy);
        row.purchase_cost = Some(purchase_cost);
        self.audit_rows.push(row);
        true
    }

    fn handle_sell(&mut self, tx: &Transaction) -> bool {
        if !tx.quantity.is_positive() {
            self.reject(tx, "sell", LotError::NonPositiveSellQuantity(tx.quantity));
            return false;
        }

        if !self.tracker.has_open_lots() {
            tracing::warn!(
                instrument = %tx.instrument,
                seq = tx.seq,
                quantity = %tx.quantity,
                "sell with no open lots"
            );
            self.note(
                tx,
                NoteKind::NothingToSell {
                    requested: tx.quantity,
                },
            );
            return false;
        }

        let sale_price = tx.effective_sale_price();
        let outcome = match self.tracker.sell(tx.quantity, sale_price) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.reject(tx, "sell", err);
                return false;
            }
        };

        if outcome.is_partial() {
            tracing::warn!(
                instrument = %tx.instrument,
                seq = tx.seq,
                requested = %tx.quantity,
                matched = %outcome.matched,
                shortfall = %outcome.shortfall,
                "sell exceeded open lots; partially matched"
            );
            self.note(
                tx,
                NoteKind::PartialFill {
                    requested: tx.quantity,
                    matched: outcome.matched,
                    shortfall: outcome.shortfall,
                },
            );
        }

        let mut row = self.base_row(tx, TradeSide::Sell);
        row.sale_price = Some(sale_price);
        row.matched_quantity = Some(outcome.matched);
        row.shortfall_quantity = Some(outcome.shortfall);
        row.realized_gain = Some(outcome.realized_gain);
        row.consumed_cost = Some(outcome.cost_removed);
        row.sale_proceeds = Some(outcome.proceeds);
        self.audit_rows.push(row);
        true
    }

    /// Row skeleton carrying the post-transaction running aggregate.
    fn base_row(&self, tx: &Transaction, action: TradeSide) -> AuditRow {
        let aggregate = self.tracker.aggregate();
        AuditRow {
            date: tx.timestamp,
            instrument: tx.instrument.clone(),
            owner: tx.owner.clone(),
            tx_key: tx.tx_key.clone(),
            action,
            quantity: tx.quantity,
            price: tx.price,
            sale_price: None,
            purchase_cost: None,
            matched_quantity: None,
            shortfall_quantity: None,
            realized_gain: None,
            consumed_cost: None,
            sale_proceeds: None,
            cumulative_realized_gain: aggregate.realized_gain_total,
            cumulative_cost: aggregate.cumulative_cost,
            open_quantity: aggregate.open_quantity,
            average_cost: aggregate.average_cost(),
        }
    }

    /// Record a transaction the tracker refused. The tracker is unchanged.
    fn reject(&mut self, tx: &Transaction, action: &str, err: LotError) {
        let kind = match err {
            LotError::NonPositiveQuantity(_) | LotError::NonPositiveSellQuantity(_) => {
                NoteKind::ZeroQuantity {
                    action: action.to_string(),
                }
            }
            LotError::Overflow(_) => NoteKind::Overflow {
                action: action.to_string(),
                reason: err.to_string(),
            },
        };
        tracing::warn!(
            instrument = %tx.instrument,
            seq = tx.seq,
            error = %err,
            "transaction rejected by lot tracker"
        );
        self.note(tx, kind);
    }

    fn note(&mut self, tx: &Transaction, kind: NoteKind) {
        self.notes.push(ProcessingNote::new(kind).for_transaction(tx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn tx(seq: u64, action: &str, qty: &str, price: &str) -> Transaction {
        Transaction::new(
            seq,
            None,
            Instrument::new("AAPL"),
            None,
            TradeTime::parse(&format!("2024-01-{:02}", seq + 1)).unwrap(),
            Action::parse(action),
            d(qty),
            d(price),
            None,
            None,
        )
    }

    #[test]
    fn test_state_transitions() {
        let mut p = TransactionProcessor::new(Instrument::new("AAPL"), None);
        assert_eq!(p.state(), ProcessorState::Idle);

        p.process(&tx(0, "buy", "1", "1")).unwrap();
        assert_eq!(p.state(), ProcessorState::Processing);

        p.finish();
        assert_eq!(p.state(), ProcessorState::Done);

        let err = p.process(&tx(1, "buy", "1", "1")).unwrap_err();
        assert_eq!(err, ProcessorError::AlreadyDone(Instrument::new("AAPL")));
        assert_eq!(p.audit_rows().len(), 1);
    }

    #[test]
    fn test_process_returns_emitted_row() {
        let mut p = TransactionProcessor::new(Instrument::new("AAPL"), None);
        let row = p.process(&tx(0, "buy", "2", "5")).unwrap().cloned().unwrap();
        assert_eq!(row.action, TradeSide::Buy);
        assert_eq!(row.purchase_cost, Some(d("10")));
        assert_eq!(row.realized_gain, None);

        let skipped = p.process(&tx(1, "hold", "2", "5")).unwrap();
        assert!(skipped.is_none());
    }

    #[test]
    fn test_sell_with_empty_queue_emits_nothing() {
        let mut p = TransactionProcessor::new(Instrument::new("AAPL"), None);
        assert!(p.process(&tx(0, "sell", "3", "5")).unwrap().is_none());
        assert!(p.audit_rows().is_empty());
        assert!(matches!(
            p.notes()[0].kind,
            NoteKind::NothingToSell { .. }
        ));
    }

    #[test]
    fn test_zero_quantity_sell_distinguished_from_nothing_to_sell() {
        let mut p = TransactionProcessor::new(Instrument::new("AAPL"), None);
        p.process(&tx(0, "buy", "1", "1")).unwrap();
        p.process(&tx(1, "sell", "0", "2")).unwrap();

        assert_eq!(p.audit_rows().len(), 1);
        assert_eq!(
            p.notes()[0].kind,
            NoteKind::ZeroQuantity {
                action: "sell".to_string()
            }
        );
        assert_eq!(p.aggregate().open_quantity, d("1"));
    }

    #[test]
    fn test_zero_quantity_buy_is_skipped() {
        let mut p = TransactionProcessor::new(Instrument::new("AAPL"), None);
        assert!(p.process(&tx(0, "buy", "0", "1")).unwrap().is_none());
        assert!(p.audit_rows().is_empty());
        assert_eq!(p.notes().len(), 1);
    }

    #[test]
    fn test_first_buy_and_platform_recorded() {
        let mut first = tx(0, "sell", "1", "1");
        first.platform = Some("Robinhood".to_string());
        let output = TransactionProcessor::run(
            Instrument::new("AAPL"),
            None,
            &[first, tx(1, "buy", "1", "1"), tx(2, "buy", "1", "1")],
        );
        assert_eq!(output.platform.as_deref(), Some("Robinhood"));
        assert_eq!(output.first_buy, Some(TradeTime::parse("2024-01-02").unwrap()));
    }

    #[test]
    fn test_sale_proceeds_and_override() {
        let mut sell = tx(1, "sell", "4", "10");
        sell.sale_price = Some(d("12"));
        let output = TransactionProcessor::run(
            Instrument::new("AAPL"),
            None,
            &[tx(0, "buy", "4", "9"), sell],
        );
        let row = &output.audit_rows[1];
        assert_eq!(row.sale_price, Some(d("12")));
        assert_eq!(row.realized_gain, Some(d("12")));
        assert_eq!(row.sale_proceeds, Some(d("48")));
        assert_eq!(row.consumed_cost, Some(d("36")));
        assert_eq!(row.price, d("10"));
    }

    #[test]
    fn test_open_lots_reported_in_fifo_order() {
        let output = TransactionProcessor::run(
            Instrument::new("AAPL"),
            None,
            &[
                tx(0, "buy", "10", "1"),
                tx(1, "buy", "10", "2"),
                tx(2, "sell", "15", "3"),
            ],
        );
        assert_eq!(output.open_lots.len(), 1);
        assert_eq!(output.open_lots[0].remaining_quantity, d("5"));
        assert_eq!(output.open_lots[0].unit_cost, d("2"));
    }

    #[test]
    fn test_run_matches_process_one_at_a_time() {
        let txs = [
            tx(0, "buy", "10", "1"),
            tx(1, "hold", "1", "1"),
            tx(2, "sell", "0", "2"),
            tx(3, "sell", "12", "3"),
            tx(4, "sell", "1", "3"),
        ];

        let mut p = TransactionProcessor::new(Instrument::new("AAPL"), None);
        let emitted = txs
            .iter()
            .filter(|t| p.process(t).unwrap().is_some())
            .count();
        let stepped = p.into_output();
        let batch = TransactionProcessor::run(Instrument::new("AAPL"), None, &txs);

        assert_eq!(emitted, 2);
        assert_eq!(stepped, batch);
        assert_eq!(batch.notes.len(), 4);
    }
}
