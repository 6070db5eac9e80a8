//! Pure computation engine for deterministic FIFO lot accounting.
//!
//! Leaf-first: [`LotQueue`] holds open lots and performs FIFO matching,
//! [`CostBasisTracker`] keeps running aggregates over it, and
//! [`TransactionProcessor`] drives both across one ordered transaction list.
//! Nothing here holds state across instruments.

pub mod cost_basis;
pub mod lot_queue;
pub mod processor;

pub use cost_basis::{CostBasisTracker, RunningAggregate};
pub use lot_queue::{Lot, LotError, LotQueue, MatchOutcome};
pub use processor::{
    OpenLot, ProcessorError, ProcessorOutput, ProcessorState, TransactionProcessor,
};
