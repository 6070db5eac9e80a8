//! Transaction type representing a single buy/sell event, plus the raw row it
//! is validated from.

use crate::domain::{Action, Decimal, Instrument, Owner, TradeTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unvalidated transaction row exactly as a transaction source supplied it.
///
/// Every field is text so that a bad value in one column never prevents the
/// row from being read; validation happens in [`Transaction::parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "ticker")]
    pub instrument: Option<String>,
    #[serde(default, alias = "created_by")]
    pub owner: Option<String>,
    #[serde(default, alias = "date")]
    pub timestamp: Option<String>,
    #[serde(default, alias = "trade_type")]
    pub action: Option<String>,
    #[serde(default, alias = "qty")]
    pub quantity: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub sale_price: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

/// Reasons a raw row cannot become a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionParseError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("could not parse timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("could not parse {field} {value:?} as a decimal")]
    InvalidDecimal { field: &'static str, value: String },
    #[error("{0} cannot be negative")]
    Negative(&'static str),
}

/// A single validated trade event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Stable unique identifier for this transaction.
    pub tx_key: String,
    /// Position of the row in its source; tie-breaker for equal timestamps.
    pub seq: u64,
    pub instrument: Instrument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
    pub timestamp: TradeTime,
    pub action: Action,
    /// Units traded. Zero is admitted so the processor can report it.
    pub quantity: Decimal,
    /// Price per unit.
    pub price: Decimal,
    /// Per-unit sale price override for a sell.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

impl Transaction {
    /// Create a new Transaction and compute its `tx_key`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        seq: u64,
        id: Option<&str>,
        instrument: Instrument,
        owner: Option<Owner>,
        timestamp: TradeTime,
        action: Action,
        quantity: Decimal,
        price: Decimal,
        sale_price: Option<Decimal>,
        platform: Option<String>,
    ) -> Self {
        let tx_key = Self::compute_tx_key(
            id,
            seq,
            &instrument,
            owner.as_ref(),
            timestamp,
            &action,
            &quantity,
            &price,
        );
        Transaction {
            tx_key,
            seq,
            instrument,
            owner,
            timestamp,
            action,
            quantity,
            price,
            sale_price,
            platform,
        }
    }

    /// Validate a raw source row.
    ///
    /// # Errors
    /// Missing instrument/timestamp/action/quantity/price, unparseable
    /// timestamps or decimals, and negative quantities or prices.
    pub fn parse(raw: &RawTransaction, seq: u64) -> Result<Self, TransactionParseError> {
        let instrument = non_empty(raw.instrument.as_deref())
            .map(Instrument::new)
            .ok_or(TransactionParseError::MissingField("instrument"))?;

        let timestamp_str = non_empty(raw.timestamp.as_deref())
            .ok_or(TransactionParseError::MissingField("timestamp"))?;
        let timestamp = TradeTime::parse(timestamp_str)
            .map_err(|_| TransactionParseError::InvalidTimestamp(timestamp_str.to_string()))?;

        let action = non_empty(raw.action.as_deref())
            .map(Action::parse)
            .ok_or(TransactionParseError::MissingField("action"))?;

        let quantity = parse_non_negative("quantity", raw.quantity.as_deref())?
            .ok_or(TransactionParseError::MissingField("quantity"))?;
        let price = parse_non_negative("price", raw.price.as_deref())?
            .ok_or(TransactionParseError::MissingField("price"))?;
        let sale_price = parse_non_negative("sale_price", raw.sale_price.as_deref())?;

        let owner = non_empty(raw.owner.as_deref()).map(Owner::new);
        let platform = non_empty(raw.platform.as_deref()).map(str::to_string);

        Ok(Transaction::new(
            seq,
            non_empty(raw.id.as_deref()),
            instrument,
            owner,
            timestamp,
            action,
            quantity,
            price,
            sale_price,
            platform,
        ))
    }

    /// Generate a stable unique key for this transaction.
    ///
    /// Priority: source `id` (if present) > hash of deterministic fields.
    /// `seq` is part of the hash so that two identical trades on the same
    /// day stay distinguishable.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_tx_key(
        id: Option<&str>,
        seq: u64,
        instrument: &Instrument,
        owner: Option<&Owner>,
        timestamp: TradeTime,
        action: &Action,
        quantity: &Decimal,
        price: &Decimal,
    ) -> String {
        if let Some(id) = id {
            return format!("id:{}", id.trim());
        }

        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(seq.to_le_bytes());
        hasher.update(instrument.as_str());
        hasher.update([0u8]);
        hasher.update(owner.map(Owner::as_str).unwrap_or(""));
        hasher.update([0u8]);
        hasher.update(timestamp.to_string());
        hasher.update(action.to_string());
        hasher.update([0u8]);
        hasher.update(quantity.to_canonical_string());
        hasher.update([0u8]);
        hasher.update(price.to_canonical_string());
        let hash = hasher.finalize();
        format!("hash:{}", hex::encode(&hash[..16]))
    }

    /// Per-unit price realized by a sell: the override when present.
    pub fn effective_sale_price(&self) -> Decimal {
        self.sale_price.unwrap_or(self.price)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_non_negative(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<Decimal>, TransactionParseError> {
    let Some(value) = non_empty(value) else {
        return Ok(None);
    };
    let parsed =
        Decimal::from_str_canonical(value).map_err(|_| TransactionParseError::InvalidDecimal {
            field,
            value: value.to_string(),
        })?;
    if parsed.is_negative() {
        return Err(TransactionParseError::Negative(field));
    }
    Ok(Some(parsed))
}
