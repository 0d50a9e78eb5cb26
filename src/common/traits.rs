//! Trait definitions for the external collaborators

use async_trait::async_trait;

use super::errors::Result;
use super::types::{MarketSnapshot, Side, TradeIntent};

/// Source of market snapshots (Polymarket Gamma API, or a fake in tests)
///
/// Timeouts are the implementation's responsibility; the orchestrator treats
/// any error as a failed fetch for the current cycle.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch a snapshot of every market the bot should evaluate this cycle
    async fn fetch_active_markets(&self) -> Result<Vec<MarketSnapshot>>;

    /// Look up the winning side of a market
    ///
    /// Returns `Ok(None)` while the market is still unresolved.
    async fn fetch_resolution(&self, market_id: &str) -> Result<Option<Side>>;
}

/// Acknowledgement for a submitted order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub order_id: String,
}

/// Submits buy orders on behalf of the bot (live mode only)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// Submit a buy order for the intent's market, side, quantity and price
    ///
    /// Fails with `BotError::Order` when the order was not accepted.
    async fn submit_order(&self, intent: &TradeIntent) -> Result<OrderReceipt>;
}
