//! Strategy module for trade decision making
//!
//! # Architecture
//!
//! ```text
//! snapshots ──► StrategyRegistry::evaluate_all ──► [TradeIntent] ──► dedup
//!                 │
//!                 ├── RuleStrategy (PriceArbitrage)
//!                 ├── RuleStrategy (MeanReversion)
//!                 └── ...
//! ```
//!
//! # Components
//!
//! - [`Strategy`]: pure `evaluate(snapshots, ctx) -> intents`
//! - [`RuleStrategy`]: the built-in threshold rules, one per [`StrategyRule`](crate::config::StrategyRule) variant
//! - [`StrategyRegistry`]: ordered strategies with per-strategy error isolation
//! - [`EvaluationContext`]: evaluation time and the previous cycle's snapshots

mod registry;
mod rules;
mod traits;
mod types;

pub use registry::{Evaluation, StrategyRegistry};
pub use rules::RuleStrategy;
pub use traits::{BoxedStrategy, Strategy};
pub use types::EvaluationContext;
