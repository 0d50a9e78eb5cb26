//! Polymarket polling trading bot
//!
//! Polls Polymarket markets on a fixed interval, runs threshold strategies over
//! the snapshots, suppresses repeated trades on an already-held (market, side),
//! and tracks the resulting positions through to settlement.

pub mod common;
pub mod config;
pub mod engine;
pub mod polymarket;
pub mod position;
pub mod strategy;

// Re-export commonly used types
pub use common::errors::{BotError, Result};
pub use common::traits::{MarketDataSource, OrderExecutor, OrderReceipt};
pub use common::types::{MarketSnapshot, PriceUpdate, Side, TokenRef, TradeIntent};
pub use config::types::AppConfig;
pub use engine::{CycleOrchestrator, CycleReport, CycleState, ExecutionGate};
pub use polymarket::{OrderGatewayClient, PolymarketClient, PriceFeed};
pub use position::{Deduplicator, PaperLedger, Position, PositionBook};
pub use strategy::{Strategy, StrategyRegistry};
