//! Routes admitted intents to dry-run logging or the order executor

use std::sync::Arc;
use tracing::{info, warn};

use crate::common::errors::BotError;
use crate::common::traits::OrderExecutor;
use crate::common::types::TradeIntent;

/// Where admitted intents go
#[derive(Clone)]
pub enum ExecutionGate {
    /// Log only; every intent counts as filled at its proposal price
    DryRun,
    /// Submit through the order executor
    Live(Arc<dyn OrderExecutor>),
}

impl std::fmt::Debug for ExecutionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionGate::DryRun => write!(f, "DryRun"),
            ExecutionGate::Live(_) => write!(f, "Live"),
        }
    }
}

#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Filled at the intent's price; `order_id` is `None` in dry-run
    Filled { order_id: Option<String> },
    /// Order was not accepted; the book must not change
    Failed(BotError),
}

impl ExecutionOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, ExecutionOutcome::Filled { .. })
    }
}

impl ExecutionGate {
    pub fn live(executor: Arc<dyn OrderExecutor>) -> Self {
        ExecutionGate::Live(executor)
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, ExecutionGate::DryRun)
    }

    pub async fn execute(&self, intent: &TradeIntent) -> ExecutionOutcome {
        match self {
            ExecutionGate::DryRun => {
                info!(
                    market_id = %intent.market_id,
                    strategy = %intent.strategy,
                    side = %intent.side,
                    "[DRY RUN] Would buy {} shares @ ${:.3} (cost ${:.2}): {}",
                    intent.quantity,
                    intent.price,
                    intent.cost(),
                    intent.reason
                );
                ExecutionOutcome::Filled { order_id: None }
            }
            ExecutionGate::Live(executor) => match executor.submit_order(intent).await {
                Ok(receipt) => {
                    info!(
                        market_id = %intent.market_id,
                        strategy = %intent.strategy,
                        side = %intent.side,
                        order_id = %receipt.order_id,
                        "Order placed: {} shares @ ${:.3}",
                        intent.quantity,
                        intent.price
                    );
                    ExecutionOutcome::Filled {
                        order_id: Some(receipt.order_id),
                    }
                }
                Err(e) => {
                    let err = match e {
                        BotError::Order { .. } => e,
                        other => BotError::order(&intent.market_id, other.to_string()),
                    };
                    warn!(
                        market_id = %intent.market_id,
                        strategy = %intent.strategy,
                        side = %intent.side,
                        stage = "executing",
                        error = %err,
                        "Order failed"
                    );
                    ExecutionOutcome::Failed(err)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::{MockOrderExecutor, OrderReceipt};
    use crate::common::types::Side;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn intent() -> TradeIntent {
        TradeIntent {
            market_id: "m1".to_string(),
            question: "BTC up?".to_string(),
            side: Side::Yes,
            quantity: 10,
            price: dec!(0.48),
            strategy: "PriceArbitrage".to_string(),
            reason: "deficit 0.04".to_string(),
            close_time: Utc::now() + Duration::minutes(15),
            volume: dec!(100),
            token_id: Some("tok_yes".to_string()),
        }
    }

    #[test]
    fn test_dry_run_fills_without_order_id() {
        let outcome = tokio_test::block_on(ExecutionGate::DryRun.execute(&intent()));
        assert!(matches!(outcome, ExecutionOutcome::Filled { order_id: None }));
        assert!(ExecutionGate::DryRun.is_dry_run());
    }

    #[tokio::test]
    async fn test_live_returns_order_id() {
        let mut executor = MockOrderExecutor::new();
        executor
            .expect_submit_order()
            .withf(|i| i.market_id == "m1" && i.quantity == 10)
            .times(1)
            .returning(|_| {
                Ok(OrderReceipt {
                    order_id: "0xabc".to_string(),
                })
            });

        let gate = ExecutionGate::live(Arc::new(executor));
        match gate.execute(&intent()).await {
            ExecutionOutcome::Filled { order_id } => assert_eq!(order_id.as_deref(), Some("0xabc")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_live_failure_becomes_order_error() {
        let mut executor = MockOrderExecutor::new();
        executor
            .expect_submit_order()
            .returning(|_| Err(BotError::Network("connection reset".into())));

        let gate = ExecutionGate::live(Arc::new(executor));
        let outcome = gate.execute(&intent()).await;
        assert!(!outcome.is_filled());
        assert!(matches!(
            outcome,
            ExecutionOutcome::Failed(BotError::Order { ref market_id, .. }) if market_id == "m1"
        ));
    }
}
