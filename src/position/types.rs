//! Position records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{BotError, Result};
use crate::common::types::{Side, TradeIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Shares held on one side of one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub market_id: String,
    pub question: String,
    pub side: Side,
    /// Cumulative shares across all fills
    pub quantity: u64,
    /// Quantity-weighted average of all fill prices
    pub avg_entry_price: Decimal,
    /// Time of the first fill
    pub entry_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub status: PositionStatus,
    /// Set on settlement
    pub realized_pnl: Option<Decimal>,
    /// Against `mark_price`; zero until first marked, and once closed
    pub unrealized_pnl: Decimal,
    /// Last price used for mark-to-market
    pub mark_price: Option<Decimal>,
    /// Strategy behind the first fill
    pub strategy: String,
    pub closed_at: Option<DateTime<Utc>>,
    /// 1.00 for the winning side, 0.00 for the losing side
    pub exit_price: Option<Decimal>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Capital committed at the average entry price
    pub fn cost_basis(&self) -> Decimal {
        Decimal::from(self.quantity) * self.avg_entry_price
    }

    /// P/L if the position were valued at `price`
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        Decimal::from(self.quantity) * (price - self.avg_entry_price)
    }
}

/// One executed (or simulated) buy to record in the book
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub market_id: String,
    pub question: String,
    pub side: Side,
    pub quantity: u64,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub strategy: String,
}

impl Fill {
    /// The fill of an intent at its proposal price
    pub fn from_intent(intent: &TradeIntent, timestamp: DateTime<Utc>) -> Self {
        Self {
            market_id: intent.market_id.clone(),
            question: intent.question.clone(),
            side: intent.side,
            quantity: intent.quantity,
            price: intent.price,
            timestamp,
            close_time: intent.close_time,
            strategy: intent.strategy.clone(),
        }
    }

    /// A fill the book can record: positive quantity, price within [0, 1]
    pub fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(BotError::order(&self.market_id, "fill quantity must be positive"));
        }
        if self.price < Decimal::ZERO || self.price > Decimal::ONE {
            return Err(BotError::order(
                &self.market_id,
                format!("fill price {} outside [0, 1]", self.price),
            ));
        }
        Ok(())
    }
}

/// Outcome of settling one position
#[derive(Debug, Clone, PartialEq)]
pub struct SettledPosition {
    pub market_id: String,
    pub side: Side,
    pub quantity: u64,
    pub avg_entry_price: Decimal,
    pub realized_pnl: Decimal,
    pub won: bool,
}
