//! Reference data supplied by the market data collaborator.
//!
//! Every figure is optional: `None` is the "unavailable" marker and is passed
//! through untouched. Only `current_price` takes part in exact arithmetic
//! (unrealized gain); the rest are informational floats.

use crate::domain::Decimal;
use serde::{Deserialize, Serialize};

/// Valuation and fundamental ratios for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fundamentals {
    pub forward_pe: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub price_to_book: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub net_profit_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub fcf_yield: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,
}

/// Per-instrument market snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSnapshot {
    pub current_price: Option<Decimal>,
    pub ema_50: Option<f64>,
    pub ema_100: Option<f64>,
    pub ema_200: Option<f64>,
    pub sector: Option<String>,
    #[serde(flatten)]
    pub fundamentals: Fundamentals,
}

impl MarketSnapshot {
    pub fn with_price(current_price: Decimal) -> Self {
        Self {
            current_price: Some(current_price),
            ..Default::default()
        }
    }
}

/// Benchmark index levels shared by every summary in a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkLevels {
    pub sp_500: Option<f64>,
    pub nasdaq: Option<f64>,
    pub russell_1000: Option<f64>,
}
