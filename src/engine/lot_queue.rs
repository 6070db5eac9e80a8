use std::collections::VecDeque;

use thiserror::Error;

use crate::domain::{Decimal, TradeTime};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LotError {
    #[error("lot quantity must be > 0, got {0}")]
    NonPositiveQuantity(Decimal),
    #[error("sell quantity must be > 0, got {0}")]
    NonPositiveSellQuantity(Decimal),
    /// A figure derived from the transaction does not fit in a decimal.
    #[error("{0} overflows the decimal range")]
    Overflow(&'static str),
}

/// One open (or partially consumed) purchase.
///
/// `unit_cost` and `original_quantity` are fixed at creation; only
/// `remaining_quantity` shrinks, and only through [`LotQueue::consume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lot {
    acquired_at: TradeTime,
    original_quantity: Decimal,
    remaining_quantity: Decimal,
    unit_cost: Decimal,
}

impl Lot {
    pub fn acquired_at(&self) -> TradeTime {
        self.acquired_at
    }

    pub fn original_quantity(&self) -> Decimal {
        self.original_quantity
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.remaining_quantity
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    /// Cost basis still carried by this lot.
    ///
    /// Never overflows: `original_quantity x unit_cost` was checked when the
    /// lot was appended and the remaining quantity only shrinks.
    pub fn remaining_cost(&self) -> Decimal {
        self.remaining_quantity
            .checked_mul(self.unit_cost)
            .unwrap_or_else(Decimal::zero)
    }
}

/// Result of matching one sell against the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchOutcome {
    /// Σ matched x (sale_price - unit_cost).
    pub realized_gain: Decimal,
    /// Σ matched x unit_cost.
    pub cost_removed: Decimal,
    /// matched x sale_price.
    pub proceeds: Decimal,
    /// Units actually taken from lots.
    pub matched: Decimal,
    /// Units requested but not available.
    pub shortfall: Decimal,
    /// Lots removed from the front because they reached zero.
    pub lots_closed: usize,
}

impl MatchOutcome {
    pub fn is_partial(&self) -> bool {
        self.shortfall.is_positive()
    }
}

/// Open lots for one instrument, oldest first.
///
/// Invariant: every lot in the queue has `remaining_quantity > 0`, so the
/// sum of remaining quantities is the open position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LotQueue {
    lots: VecDeque<Lot>,
}

impl LotQueue {
    pub fn new() -> Self {
        Self {
            lots: VecDeque::new(),
        }
    }

    /// Append a new lot at the back of the queue.
    ///
    /// # Errors
    /// Rejects a quantity that is not strictly positive, or a lot whose
    /// total cost is not representable; the queue is left untouched.
    pub fn append_lot(
        &mut self,
        acquired_at: TradeTime,
        quantity: Decimal,
        unit_cost: Decimal,
    ) -> Result<(), LotError> {
        if !quantity.is_positive() {
            return Err(LotError::NonPositiveQuantity(quantity));
        }
        quantity
            .checked_mul(unit_cost)
            .ok_or(LotError::Overflow("lot cost"))?;

        self.lots.push_back(Lot {
            acquired_at,
            original_quantity: quantity,
            remaining_quantity: quantity,
            unit_cost,
        });
        Ok(())
    }

    /// Work out what selling `quantity` units at `sale_price` would match,
    /// without touching the queue.
    ///
    /// # Errors
    /// Rejects a quantity that is not strictly positive, and any sale whose
    /// gain or proceeds are not representable.
    pub fn preview(&self, quantity: Decimal, sale_price: Decimal) -> Result<MatchOutcome, LotError> {
        if !quantity.is_positive() {
            return Err(LotError::NonPositiveSellQuantity(quantity));
        }

        let mut outcome = MatchOutcome::default();
        let mut outstanding = quantity;

        for lot in &self.lots {
            if !outstanding.is_positive() {
                break;
            }

            let matched = outstanding.min(lot.remaining_quantity);
            let gain = sale_price
                .checked_sub(lot.unit_cost)
                .and_then(|spread| matched.checked_mul(spread))
                .ok_or(LotError::Overflow("realized gain"))?;
            outcome.realized_gain = outcome
                .realized_gain
                .checked_add(gain)
                .ok_or(LotError::Overflow("realized gain"))?;
            outcome.cost_removed = matched
                .checked_mul(lot.unit_cost)
                .and_then(|cost| outcome.cost_removed.checked_add(cost))
                .ok_or(LotError::Overflow("consumed cost"))?;
            outcome.matched = outcome
                .matched
                .checked_add(matched)
                .ok_or(LotError::Overflow("matched quantity"))?;

            outstanding = outstanding - matched;
            if matched == lot.remaining_quantity {
                outcome.lots_closed += 1;
            }
        }

        outcome.proceeds = outcome
            .matched
            .checked_mul(sale_price)
            .ok_or(LotError::Overflow("sale proceeds"))?;
        outcome.shortfall = outstanding;
        Ok(outcome)
    }

    /// Remove what a [`LotQueue::preview`] of the current queue matched.
    pub fn commit(&mut self, outcome: &MatchOutcome) {
        let mut left = outcome.matched;
        for _ in 0..outcome.lots_closed {
            if let Some(lot) = self.lots.pop_front() {
                left = left - lot.remaining_quantity;
            }
        }
        if left.is_positive() {
            if let Some(front) = self.lots.front_mut() {
                front.remaining_quantity = front.remaining_quantity - left;
            }
        }
    }

    /// Consume `quantity` units from the front of the queue at `sale_price`.
    ///
    /// Stops early when the queue runs out; the outcome then reports the
    /// unmatched remainder as `shortfall` instead of failing.
    ///
    /// # Errors
    /// As [`LotQueue::preview`]; on error the queue is unchanged.
    pub fn consume(
        &mut self,
        quantity: Decimal,
        sale_price: Decimal,
    ) -> Result<MatchOutcome, LotError> {
        let outcome = self.preview(quantity, sale_price)?;
        self.commit(&outcome);
        Ok(outcome)
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    /// Open lots, oldest first.
    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    pub fn front(&self) -> Option<&Lot> {
        self.lots.front()
    }

    /// Σ remaining_quantity, `None` if not representable. O(n); the tracker
    /// keeps this incrementally.
    pub fn total_remaining(&self) -> Option<Decimal> {
        Decimal::checked_sum(self.lots.iter().map(Lot::remaining_quantity))
    }

    /// Σ remaining cost, `None` if not representable.
    pub fn total_remaining_cost(&self) -> Option<Decimal> {
        Decimal::checked_sum(self.lots.iter().map(Lot::remaining_cost))
    }
}
