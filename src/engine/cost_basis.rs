use serde::{Deserialize, Serialize};

use crate::domain::{Decimal, TradeTime};

use super::lot_queue::{LotError, LotQueue, MatchOutcome};

/// Running aggregate for one instrument at a point in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunningAggregate {
    /// Σ unit_cost x remaining_quantity over open lots.
    pub cumulative_cost: Decimal,
    /// Σ remaining_quantity over open lots.
    pub open_quantity: Decimal,
    /// Σ realized gain over every sale so far.
    pub realized_gain_total: Decimal,
}

impl RunningAggregate {
    /// cumulative_cost / open_quantity, or zero when flat.
    pub fn average_cost(&self) -> Decimal {
        if self.open_quantity.is_positive() {
            self.cumulative_cost.div_or_zero(self.open_quantity)
        } else {
            Decimal::zero()
        }
    }

    pub fn is_flat(&self) -> bool {
        self.open_quantity.is_zero()
    }
}

/// Lot queue plus incrementally maintained aggregates.
///
/// Every update is O(1) in the aggregates; only the matcher walks lots.
#[derive(Debug, Clone, Default)]
pub struct CostBasisTracker {
    queue: LotQueue,
    aggregate: RunningAggregate,
}

impl CostBasisTracker {
    pub fn new() -> Self {
        Self {
            queue: LotQueue::new(),
            aggregate: RunningAggregate::default(),
        }
    }

    /// Record a purchase. Returns the purchase cost (quantity x price).
    ///
    /// # Errors
    /// A non-positive quantity, or a cost or position outside the decimal
    /// range. Nothing changes on error.
    pub fn buy(
        &mut self,
        acquired_at: TradeTime,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Decimal, LotError> {
        if !quantity.is_positive() {
            return Err(LotError::NonPositiveQuantity(quantity));
        }
        let purchase_cost = quantity
            .checked_mul(price)
            .ok_or(LotError::Overflow("purchase cost"))?;
        let cumulative_cost = self
            .aggregate
            .cumulative_cost
            .checked_add(purchase_cost)
            .ok_or(LotError::Overflow("cumulative cost"))?;
        let open_quantity = self
            .aggregate
            .open_quantity
            .checked_add(quantity)
            .ok_or(LotError::Overflow("open quantity"))?;

        self.queue.append_lot(acquired_at, quantity, price)?;
        self.aggregate.cumulative_cost = cumulative_cost;
        self.aggregate.open_quantity = open_quantity;
        Ok(purchase_cost)
    }

    /// Match a sale against open lots and fold the outcome into the aggregate.
    ///
    /// # Errors
    /// A non-positive quantity, or a gain outside the decimal range. Nothing
    /// changes on error.
    pub fn sell(&mut self, quantity: Decimal, sale_price: Decimal) -> Result<MatchOutcome, LotError> {
        let outcome = self.queue.preview(quantity, sale_price)?;
        let realized_gain_total = self
            .aggregate
            .realized_gain_total
            .checked_add(outcome.realized_gain)
            .ok_or(LotError::Overflow("realized gain total"))?;

        self.queue.commit(&outcome);
        // Both shrink by amounts they already contain.
        self.aggregate.cumulative_cost -= outcome.cost_removed;
        self.aggregate.open_quantity -= outcome.matched;
        self.aggregate.realized_gain_total = realized_gain_total;
        Ok(outcome)
    }

    /// Zero the accumulated realized gain, leaving open lots untouched.
    pub fn reset_realized_gain(&mut self) {
        self.aggregate.realized_gain_total = Decimal::zero();
    }

    pub fn aggregate(&self) -> RunningAggregate {
        self.aggregate
    }

    pub fn average_cost(&self) -> Decimal {
        self.aggregate.average_cost()
    }

    pub fn has_open_lots(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn queue(&self) -> &LotQueue {
        &self.queue
    }
}
