//! Trade deduplication gate
//!
//! Strategies re-propose the same opportunity every cycle; the gate keeps at
//! most one open position per (market, side) no matter how many cycles or
//! strategies propose it.

use chrono::{DateTime, Utc};

use super::book::PositionBook;
use crate::common::types::TradeIntent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// An open position already exists for the intent's (market, side)
    AlreadyOpen,
    /// The market's close time has passed
    MarketClosed,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::AlreadyOpen => write!(f, "position already open"),
            RejectReason::MarketClosed => write!(f, "market already closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Reject(RejectReason),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accept)
    }
}

/// Decides whether an intent may proceed to execution
#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    /// Reject if (market, side) is already open or the market has closed
    pub fn admit(&self, intent: &TradeIntent, book: &PositionBook, now: DateTime<Utc>) -> Admission {
        if book.has_open(&intent.market_id, intent.side) {
            return Admission::Reject(RejectReason::AlreadyOpen);
        }
        if intent.close_time <= now {
            return Admission::Reject(RejectReason::MarketClosed);
        }
        Admission::Accept
    }
}
