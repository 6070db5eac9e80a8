//! Stable transaction ordering for deterministic processing.

use crate::domain::{TradeTime, Transaction};

/// Stable ordering key for transactions.
///
/// Ordering: timestamp -> input sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TransactionOrderingKey {
    /// Trade time (primary sort).
    pub timestamp: TradeTime,
    /// Position in the source (tie-breaker).
    pub seq: u64,
}

impl TransactionOrderingKey {
    pub fn from_transaction(tx: &Transaction) -> Self {
        TransactionOrderingKey {
            timestamp: tx.timestamp,
            seq: tx.seq,
        }
    }

    /// Returns true if tx_a should be processed before tx_b.
    pub fn should_come_before(tx_a: &Transaction, tx_b: &Transaction) -> bool {
        Self::from_transaction(tx_a) < Self::from_transaction(tx_b)
    }
}

/// Sort transactions chronologically, equal timestamps keeping input order.
pub fn sort_transactions_deterministic(transactions: &mut [Transaction]) {
    transactions.sort_by_key(TransactionOrderingKey::from_transaction);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, Decimal, Instrument};

    fn make_tx(seq: u64, timestamp: &str) -> Transaction {
        Transaction::new(
            seq,
            None,
            Instrument::new("AAPL"),
            None,
            TradeTime::parse(timestamp).unwrap(),
            Action::Buy,
            Decimal::from(1),
            Decimal::from(100),
            None,
            None,
        )
    }

    #[test]
    fn test_ordering_by_time() {
        let a = make_tx(5, "2024-01-01");
        let b = make_tx(1, "2024-01-02");
        assert!(TransactionOrderingKey::should_come_before(&a, &b));
        assert!(!TransactionOrderingKey::should_come_before(&b, &a));
    }

    #[test]
    fn test_same_time_falls_back_to_input_order() {
        let a = make_tx(1, "2024-01-01");
        let b = make_tx(2, "2024-01-01");
        assert!(TransactionOrderingKey::should_come_before(&a, &b));
    }

    #[test]
    fn test_sort_transactions_deterministic() {
        let mut txs = vec![
            make_tx(0, "2024-01-03"),
            make_tx(2, "2024-01-01"),
            make_tx(1, "2024-01-01"),
        ];

        sort_transactions_deterministic(&mut txs);

        let seqs: Vec<u64> = txs.iter().map(|t| t.seq).collect();
        assert_eq!(seqs, vec![1, 2, 0]);
    }
}
