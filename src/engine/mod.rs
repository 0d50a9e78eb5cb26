//! The trading loop and its execution path
//!
//! ```text
//! MarketDataSource ──► StrategyRegistry ──► Deduplicator ──► ExecutionGate ──► PositionBook
//!        ▲                                                        │
//!        │ every poll_interval                                    └──► PaperLedger (dry-run)
//! PriceFeed ──► LatestPriceCache ──► mark-to-market (hint only)
//! ```

mod execution;
mod orchestrator;
mod price_cache;

pub use execution::{ExecutionGate, ExecutionOutcome};
pub use orchestrator::{CycleOrchestrator, CycleReport, CycleState, CycleStats};
pub use price_cache::LatestPriceCache;
