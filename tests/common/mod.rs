//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use polymarket_bot::common::errors::{BotError, Result};
use polymarket_bot::common::traits::{MarketDataSource, OrderExecutor, OrderReceipt};
use polymarket_bot::common::types::{MarketSnapshot, Side, TradeIntent};
use polymarket_bot::config::StrategyRule;
use polymarket_bot::position::Fill;
use polymarket_bot::strategy::{BoxedStrategy, EvaluationContext, RuleStrategy, Strategy};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A market closing `close_in` after `now`
pub fn snapshot(
    market_id: &str,
    yes: Decimal,
    no: Decimal,
    now: DateTime<Utc>,
    close_in: Duration,
) -> MarketSnapshot {
    MarketSnapshot {
        market_id: market_id.to_string(),
        question: format!("Will {} resolve YES?", market_id),
        yes_price: Some(yes),
        no_price: Some(no),
        volume: dec!(1500),
        close_time: now + close_in,
        yes_token_id: Some(format!("{}_yes", market_id)),
        no_token_id: Some(format!("{}_no", market_id)),
    }
}

pub fn intent(market_id: &str, side: Side, quantity: u64, price: Decimal, close_time: DateTime<Utc>) -> TradeIntent {
    TradeIntent {
        market_id: market_id.to_string(),
        question: format!("Will {} resolve YES?", market_id),
        side,
        quantity,
        price,
        strategy: "PriceArbitrage".to_string(),
        reason: "test".to_string(),
        close_time,
        volume: dec!(1500),
        token_id: Some(format!("{}_{}", market_id, side)),
    }
}

pub fn fill(market_id: &str, side: Side, quantity: u64, price: Decimal, at: DateTime<Utc>) -> Fill {
    Fill {
        market_id: market_id.to_string(),
        question: format!("Will {} resolve YES?", market_id),
        side,
        quantity,
        price,
        timestamp: at,
        close_time: at + Duration::minutes(15),
        strategy: "PriceArbitrage".to_string(),
    }
}

pub fn price_arbitrage(threshold: Decimal, shares: u64) -> BoxedStrategy {
    Box::new(RuleStrategy::new(
        StrategyRule::PriceArbitrage {
            deviation_threshold: threshold,
        },
        shares,
    ))
}

/// Market data source driven by the test
#[derive(Default)]
pub struct FakeMarketSource {
    snapshots: Mutex<Vec<MarketSnapshot>>,
    resolutions: Mutex<HashMap<String, Side>>,
    failing: Mutex<bool>,
    resolution_requests: Mutex<Vec<String>>,
}

impl FakeMarketSource {
    pub fn with_snapshots(snapshots: Vec<MarketSnapshot>) -> Self {
        let source = Self::default();
        source.set_snapshots(snapshots);
        source
    }

    pub fn set_snapshots(&self, snapshots: Vec<MarketSnapshot>) {
        *self.snapshots.lock().unwrap() = snapshots;
    }

    pub fn resolve(&self, market_id: &str, winner: Side) {
        self.resolutions
            .lock()
            .unwrap()
            .insert(market_id.to_string(), winner);
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn resolution_requests(&self) -> Vec<String> {
        self.resolution_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataSource for FakeMarketSource {
    async fn fetch_active_markets(&self) -> Result<Vec<MarketSnapshot>> {
        if *self.failing.lock().unwrap() {
            return Err(BotError::Network("connection refused".to_string()));
        }
        Ok(self.snapshots.lock().unwrap().clone())
    }

    async fn fetch_resolution(&self, market_id: &str) -> Result<Option<Side>> {
        self.resolution_requests
            .lock()
            .unwrap()
            .push(market_id.to_string());
        Ok(self.resolutions.lock().unwrap().get(market_id).copied())
    }
}

/// Order executor that records submissions and rejects chosen markets
#[derive(Default)]
pub struct RecordingExecutor {
    rejected_markets: Mutex<HashSet<String>>,
    submitted: Mutex<Vec<TradeIntent>>,
}

impl RecordingExecutor {
    pub fn reject_market(&self, market_id: &str) {
        self.rejected_markets
            .lock()
            .unwrap()
            .insert(market_id.to_string());
    }

    pub fn submitted(&self) -> Vec<TradeIntent> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderExecutor for RecordingExecutor {
    async fn submit_order(&self, intent: &TradeIntent) -> Result<OrderReceipt> {
        self.submitted.lock().unwrap().push(intent.clone());
        if self.rejected_markets.lock().unwrap().contains(&intent.market_id) {
            return Err(BotError::order(&intent.market_id, "order rejected: not enough balance"));
        }
        Ok(OrderReceipt {
            order_id: format!("order-{}-{}", intent.market_id, intent.side),
        })
    }
}

/// Strategy that fails whenever it sees `poison_market`
pub struct PoisonedStrategy {
    pub poison_market: String,
}

impl Strategy for PoisonedStrategy {
    fn name(&self) -> &str {
        "Poisoned"
    }

    fn evaluate(&self, snapshots: &[MarketSnapshot], _ctx: &EvaluationContext) -> Result<Vec<TradeIntent>> {
        if snapshots.iter().any(|s| s.market_id == self.poison_market) {
            return Err(BotError::strategy("Poisoned", format!("cannot handle {}", self.poison_market)));
        }
        Ok(Vec::new())
    }
}

/// Sample Gamma API responses
pub mod gamma_responses {
    /// One open market with string-encoded prices and token ids
    pub const OPEN_MARKET: &str = r#"{
        "id": "516710",
        "question": "Bitcoin Up or Down - 10:00AM-10:15AM ET",
        "conditionId": "0xabc",
        "slug": "btc-updown-15m-1760882400",
        "endDate": "2099-10-19T14:15:00Z",
        "volumeNum": 1523.5,
        "outcomePrices": "[\"0.48\", \"0.48\"]",
        "clobTokenIds": "[\"111\", \"222\"]",
        "active": true,
        "closed": false,
        "archived": false
    }"#;

    /// The same market after resolving to NO
    pub const RESOLVED_NO: &str = r#"{
        "id": "516710",
        "question": "Bitcoin Up or Down - 10:00AM-10:15AM ET",
        "endDate": "2020-10-19T14:15:00Z",
        "outcomePrices": ["0", "1"],
        "active": true,
        "closed": true
    }"#;
}
