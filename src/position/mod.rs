//! Position tracking, deduplication and the paper-trade ledger
//!
//! - [`PositionBook`]: open/closed positions per (market, side), persisted on every mutation
//! - [`Deduplicator`]: admits an intent only when its (market, side) has no open position
//! - [`PaperLedger`]: append-only record of simulated fills and market resolutions
//! - [`Store`]: where the book and ledger documents live (JSON file or memory)

mod book;
mod dedup;
mod paper;
mod store;
mod types;

pub use book::{BookDocument, PositionBook};
pub use dedup::{Admission, Deduplicator, RejectReason};
pub use paper::{LedgerDocument, MarketResolution, PaperLedger, PaperStats, PaperTradeRecord};
pub use store::{JsonFileStore, MemoryStore, Store};
pub use types::{Fill, Position, PositionStatus, SettledPosition};
