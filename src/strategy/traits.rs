use crate::common::errors::Result;
use crate::common::types::{MarketSnapshot, TradeIntent};
use crate::strategy::types::EvaluationContext;

/// Core strategy trait
///
/// A strategy maps the cycle's snapshots to proposed buys. Thresholds are set
/// at construction and never change.
///
/// # Implementation Notes
///
/// - `evaluate` must be pure: no I/O, no interior mutability
/// - A snapshot with a missing price is skipped, never an error
/// - An `Err` discards only this strategy's output for the cycle
pub trait Strategy: Send + Sync {
    /// Unique identifier for this strategy, copied onto every intent
    fn name(&self) -> &str;

    /// Propose trades for this cycle, in snapshot order
    fn evaluate(
        &self,
        snapshots: &[MarketSnapshot],
        ctx: &EvaluationContext,
    ) -> Result<Vec<TradeIntent>>;
}

/// Boxed strategy for dynamic dispatch
pub type BoxedStrategy = Box<dyn Strategy>;
