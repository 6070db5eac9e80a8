//! Audit row: the per-transaction output record.

use crate::domain::{Decimal, Instrument, Owner, TradeTime};
use serde::{Deserialize, Serialize};

/// Side of a processed trade. Only recognized actions ever reach an audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// One row per processed buy or sell, carrying the running position after it.
///
/// Sale-only fields are `None` on buy rows; `purchase_cost` is `None` on sell
/// rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRow {
    pub date: TradeTime,
    pub instrument: Instrument,
    pub owner: Option<Owner>,
    pub tx_key: String,
    pub action: TradeSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    /// quantity x price for a buy.
    pub purchase_cost: Option<Decimal>,
    /// Units actually matched against open lots.
    pub matched_quantity: Option<Decimal>,
    /// Units requested but not covered by open lots.
    pub shortfall_quantity: Option<Decimal>,
    /// Realized gain on this sale alone.
    pub realized_gain: Option<Decimal>,
    /// Cost basis removed from the queue by this sale.
    pub consumed_cost: Option<Decimal>,
    /// matched x sale price.
    pub sale_proceeds: Option<Decimal>,
    pub cumulative_realized_gain: Decimal,
    pub cumulative_cost: Decimal,
    pub open_quantity: Decimal,
    pub average_cost: Decimal,
}

impl AuditRow {
    /// True when a sell could not be fully matched.
    pub fn is_partial_fill(&self) -> bool {
        self.shortfall_quantity
            .map(|shortfall| shortfall.is_positive())
            .unwrap_or(false)
    }
}
