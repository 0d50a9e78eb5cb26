//! Domain types shared by the market data, strategy and position layers

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome side of a binary market
///
/// For BTC 15-minute markets YES is "UP" and NO is "DOWN".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// The other outcome of the same market
    pub fn opposite(self) -> Side {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Point-in-time view of one market, produced once per poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Market identifier, stable across polls
    pub market_id: String,
    /// Human-readable market question
    pub question: String,
    /// YES price (0.00 to 1.00); `None` when the API gave no usable price
    pub yes_price: Option<Decimal>,
    /// NO price (0.00 to 1.00); YES + NO is not required to equal 1
    pub no_price: Option<Decimal>,
    /// Traded volume in dollars
    pub volume: Decimal,
    /// When the market stops trading
    pub close_time: DateTime<Utc>,
    /// CLOB token id of the YES outcome, when known
    #[serde(default)]
    pub yes_token_id: Option<String>,
    /// CLOB token id of the NO outcome, when known
    #[serde(default)]
    pub no_token_id: Option<String>,
}

impl MarketSnapshot {
    /// Price of one side
    pub fn price(&self, side: Side) -> Option<Decimal> {
        match side {
            Side::Yes => self.yes_price,
            Side::No => self.no_price,
        }
    }

    /// Both prices, or `None` if either is missing
    pub fn prices(&self) -> Option<(Decimal, Decimal)> {
        Some((self.yes_price?, self.no_price?))
    }

    /// Token id of one side
    pub fn token_id(&self, side: Side) -> Option<&str> {
        match side {
            Side::Yes => self.yes_token_id.as_deref(),
            Side::No => self.no_token_id.as_deref(),
        }
    }

    /// The cheaper side; ties go to YES
    pub fn cheaper_side(&self) -> Option<Side> {
        let (yes, no) = self.prices()?;
        Some(if yes <= no { Side::Yes } else { Side::No })
    }

    /// Time left until close (negative once closed)
    pub fn time_until_close(&self, now: DateTime<Utc>) -> Duration {
        self.close_time - now
    }

    /// Minutes left until close, with sub-minute precision
    pub fn minutes_until_close(&self, now: DateTime<Utc>) -> Decimal {
        Decimal::from(self.time_until_close(now).num_seconds()) / Decimal::from(60)
    }

    /// Hours left until close, with sub-hour precision
    pub fn hours_until_close(&self, now: DateTime<Utc>) -> Decimal {
        Decimal::from(self.time_until_close(now).num_seconds()) / Decimal::from(3600)
    }

    /// Whether the market has reached its close time
    pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
        self.close_time <= now
    }

    /// Token references for price-feed subscription
    pub fn tokens(&self) -> Vec<TokenRef> {
        [Side::Yes, Side::No]
            .into_iter()
            .filter_map(|side| {
                self.token_id(side).map(|asset_id| TokenRef {
                    asset_id: asset_id.to_string(),
                    market_id: self.market_id.clone(),
                    side,
                })
            })
            .collect()
    }
}

/// A proposed buy, produced by a strategy and consumed within the same cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub market_id: String,
    pub question: String,
    pub side: Side,
    /// Number of shares to buy (always positive)
    pub quantity: u64,
    /// Snapshot price at proposal time; never re-quoted
    pub price: Decimal,
    /// Name of the strategy that proposed this trade
    pub strategy: String,
    /// Human-readable justification
    pub reason: String,
    /// Close time of the market, copied from the snapshot
    pub close_time: DateTime<Utc>,
    /// Market volume at proposal time
    pub volume: Decimal,
    /// CLOB token id of the side being bought, when known
    #[serde(default)]
    pub token_id: Option<String>,
}

impl TradeIntent {
    /// Propose buying `quantity` shares of `side` at the snapshot's price
    ///
    /// Returns `None` when the snapshot has no price for that side or the
    /// quantity is zero.
    pub fn buy(
        snapshot: &MarketSnapshot,
        side: Side,
        quantity: u64,
        strategy: impl Into<String>,
        reason: impl Into<String>,
    ) -> Option<Self> {
        if quantity == 0 {
            return None;
        }
        let price = snapshot.price(side)?;
        Some(Self {
            market_id: snapshot.market_id.clone(),
            question: snapshot.question.clone(),
            side,
            quantity,
            price,
            strategy: strategy.into(),
            reason: reason.into(),
            close_time: snapshot.close_time,
            volume: snapshot.volume,
            token_id: snapshot.token_id(side).map(str::to_string),
        })
    }

    /// Dollar cost of the trade at the proposal price
    pub fn cost(&self) -> Decimal {
        Decimal::from(self.quantity) * self.price
    }
}

/// Maps a CLOB token to the market and side it prices
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRef {
    pub asset_id: String,
    pub market_id: String,
    pub side: Side,
}

/// Real-time price hint delivered by the WebSocket feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub market_id: String,
    pub side: Side,
    pub price: Decimal,
    pub received_at: DateTime<Utc>,
}

/// Connection status for the price feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Successfully connected
    Connected,
    /// Disconnected (with optional reason)
    Disconnected(Option<String>),
    /// Attempting to reconnect
    Reconnecting { attempt: u32 },
    /// Connection error
    Error(String),
}
