use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{BenchmarkLevels, Decimal, Instrument, MarketSnapshot, Owner};
use crate::engine::ProcessorOutput;

/// One summary record per processing group.
///
/// Fields are kept flat so the record writes as a single CSV row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSummary {
    pub instrument: Instrument,
    pub owner: Option<Owner>,
    pub platform: Option<String>,
    pub open_quantity: Decimal,
    pub average_cost: Decimal,
    pub cumulative_cost: Decimal,
    pub realized_gain_total: Decimal,
    pub current_price: Option<Decimal>,
    pub unrealized_gain_loss: Decimal,
    pub position_weight: Decimal,
    pub first_buy_date: Option<NaiveDate>,
    pub first_buy_age_days: Option<i64>,
    pub average_age_days: Option<Decimal>,
    pub sector: Option<String>,
    pub ema_50: Option<f64>,
    pub ema_100: Option<f64>,
    pub ema_200: Option<f64>,
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
    pub sp_500: Option<f64>,
    pub nasdaq: Option<f64>,
    pub russell_1000: Option<f64>,
    pub audit_digest: String,
}

/// open_quantity x (current_price - average_cost), or zero when flat or
/// when no price is available.
///
/// `None` when the result does not fit in a decimal.
pub fn unrealized_gain_loss(
    open_quantity: Decimal,
    average_cost: Decimal,
    current_price: Option<Decimal>,
) -> Option<Decimal> {
    match current_price {
        Some(price) if open_quantity.is_positive() => price
            .checked_sub(average_cost)
            .and_then(|spread| open_quantity.checked_mul(spread)),
        _ => Some(Decimal::zero()),
    }
}

/// Each cost's share of the total; all zero when the total is zero or does
/// not fit in a decimal.
pub fn position_weights(costs: &[Decimal]) -> Vec<Decimal> {
    let total = Decimal::checked_sum(costs.iter().copied()).unwrap_or_else(Decimal::zero);
    costs.iter().map(|cost| cost.div_or_zero(total)).collect()
}

/// Remaining-quantity-weighted age of open lots in days, `None` when flat
/// or when the weighted total does not fit in a decimal.
pub fn average_age_days(output: &ProcessorOutput, as_of: NaiveDate) -> Option<Decimal> {
    let open = Decimal::checked_sum(output.open_lots.iter().map(|lot| lot.remaining_quantity))?;
    if !open.is_positive() {
        return None;
    }
    let weighted = output.open_lots.iter().try_fold(Decimal::zero(), |acc, lot| {
        let age = (as_of - lot.acquired_at.date()).num_days();
        Decimal::from(age)
            .checked_mul(lot.remaining_quantity)
            .and_then(|days| acc.checked_add(days))
    })?;
    weighted.checked_div(open)
}

/// Merge a processor's result with market reference data.
///
/// `position_weight` is left at zero; it depends on every group in the
/// portfolio and is filled in by [`apply_position_weights`].
pub fn build_summary(
    output: &ProcessorOutput,
    snapshot: Option<&MarketSnapshot>,
    benchmarks: &BenchmarkLevels,
    as_of: NaiveDate,
) -> InstrumentSummary {
    let empty = MarketSnapshot::default();
    let market = snapshot.unwrap_or(&empty);
    let aggregate = output.aggregate;
    let average_cost = aggregate.average_cost();
    let first_buy_date = output.first_buy.map(|t| t.date());

    InstrumentSummary {
        instrument: output.instrument.clone(),
        owner: output.owner.clone(),
        platform: output.platform.clone(),
        open_quantity: aggregate.open_quantity,
        average_cost,
        cumulative_cost: aggregate.cumulative_cost,
        realized_gain_total: aggregate.realized_gain_total,
        current_price: market.current_price,
        unrealized_gain_loss: unrealized_gain_loss(
            aggregate.open_quantity,
            average_cost,
            market.current_price,
        )
        .unwrap_or_else(|| {
            tracing::warn!(
                instrument = %output.instrument,
                "unrealized gain/loss out of decimal range; reported as zero"
            );
            Decimal::zero()
        }),
        position_weight: Decimal::zero(),
        first_buy_date,
        first_buy_age_days: first_buy_date.map(|date| (as_of - date).num_days()),
        average_age_days: average_age_days(output, as_of),
        sector: market.sector.clone(),
        ema_50: market.ema_50,
        ema_100: market.ema_100,
        ema_200: market.ema_200,
        forward_pe: market.fundamentals.forward_pe,
        trailing_pe: market.fundamentals.trailing_pe,
        price_to_sales: market.fundamentals.price_to_sales,
        price_to_book: market.fundamentals.price_to_book,
        peg_ratio: market.fundamentals.peg_ratio,
        net_profit_margin: market.fundamentals.net_profit_margin,
        return_on_equity: market.fundamentals.return_on_equity,
        current_ratio: market.fundamentals.current_ratio,
        debt_to_equity: market.fundamentals.debt_to_equity,
        fcf_yield: market.fundamentals.fcf_yield,
        revenue_growth: market.fundamentals.revenue_growth,
        earnings_growth: market.fundamentals.earnings_growth,
        sp_500: benchmarks.sp_500,
        nasdaq: benchmarks.nasdaq,
        russell_1000: benchmarks.russell_1000,
        audit_digest: output.digest(),
    }
}

/// Fill in `position_weight` across the whole portfolio.
pub fn apply_position_weights(summaries: &mut [InstrumentSummary]) {
    let costs: Vec<Decimal> = summaries.iter().map(|s| s.cumulative_cost).collect();
    for (summary, weight) in summaries.iter_mut().zip(position_weights(&costs)) {
        summary.position_weight = weight;
    }
}
