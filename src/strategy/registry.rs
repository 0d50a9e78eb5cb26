//! Ordered set of strategies run against every cycle's snapshots

use tracing::{debug, error, info};

use crate::common::errors::BotError;
use crate::common::types::{MarketSnapshot, TradeIntent};
use crate::config::types::StrategyConfig;
use crate::strategy::rules::RuleStrategy;
use crate::strategy::traits::BoxedStrategy;
use crate::strategy::types::EvaluationContext;

/// Output of one evaluation pass across all strategies
#[derive(Debug, Default)]
pub struct Evaluation {
    /// Intents of the strategies that succeeded, concatenated in strategy order
    pub intents: Vec<TradeIntent>,
    /// One entry per strategy that failed
    pub errors: Vec<BotError>,
}

/// Holds the strategy instances in evaluation order
pub struct StrategyRegistry {
    strategies: Vec<BoxedStrategy>,
}

impl StrategyRegistry {
    pub fn new(strategies: Vec<BoxedStrategy>) -> Self {
        Self { strategies }
    }

    /// Build the enabled strategies from config, keeping config order
    pub fn from_config(configs: &[StrategyConfig]) -> Self {
        let strategies: Vec<BoxedStrategy> = configs
            .iter()
            .filter(|cfg| cfg.enabled)
            .map(|cfg| {
                info!(name = cfg.rule.name(), shares = cfg.shares, "Registered strategy");
                Box::new(RuleStrategy::new(cfg.rule.clone(), cfg.shares)) as BoxedStrategy
            })
            .collect();

        Self { strategies }
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run every strategy over the same snapshots
    ///
    /// A failing strategy is logged and skipped; the others still run.
    pub fn evaluate_all(&self, snapshots: &[MarketSnapshot], ctx: &EvaluationContext) -> Evaluation {
        let mut evaluation = Evaluation::default();

        for strategy in &self.strategies {
            match strategy.evaluate(snapshots, ctx) {
                Ok(intents) => {
                    debug!(
                        strategy = strategy.name(),
                        "Found {} opportunities",
                        intents.len()
                    );
                    evaluation.intents.extend(intents);
                }
                Err(e) => {
                    let err = match e {
                        BotError::Strategy { .. } => e,
                        other => BotError::strategy(strategy.name(), other.to_string()),
                    };
                    error!(strategy = strategy.name(), stage = "evaluating", error = %err, "Strategy failed");
                    evaluation.errors.push(err);
                }
            }
        }

        evaluation
    }
}
