//! Polymarket-specific message types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Gamma API Response Types (Market Discovery)
// ============================================================================

/// Market from the Gamma API
///
/// Gamma encodes several list fields as JSON strings (`"[\"0.7\", \"0.3\"]"`),
/// so those are read through [`EncodedList`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub volume_num: Option<Decimal>,
    #[serde(default)]
    pub outcome_prices: Option<EncodedList>,
    #[serde(default)]
    pub clob_token_ids: Option<EncodedList>,
    #[serde(default)]
    pub best_bid: Option<Decimal>,
    #[serde(default)]
    pub best_ask: Option<Decimal>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub closed: Option<bool>,
    #[serde(default)]
    pub archived: Option<bool>,
}

impl GammaMarket {
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(false)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.unwrap_or(false)
    }

    pub fn is_archived(&self) -> bool {
        self.archived.unwrap_or(false)
    }

    /// Outcome prices as strings, YES first
    pub fn outcome_prices(&self) -> Vec<String> {
        self.outcome_prices
            .as_ref()
            .map(EncodedList::values)
            .unwrap_or_default()
    }

    /// CLOB token ids, YES first
    pub fn token_ids(&self) -> Vec<String> {
        self.clob_token_ids
            .as_ref()
            .map(EncodedList::values)
            .unwrap_or_default()
    }
}

/// A list that Gamma sends either as a JSON array or as a JSON-encoded string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EncodedList {
    List(Vec<serde_json::Value>),
    Encoded(String),
}

impl EncodedList {
    /// The list items rendered as strings; an undecodable string yields nothing
    pub fn values(&self) -> Vec<String> {
        let items = match self {
            EncodedList::List(items) => items.clone(),
            EncodedList::Encoded(raw) => serde_json::from_str(raw).unwrap_or_default(),
        };
        items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()
    }
}

/// Paginated Gamma markets response
///
/// `/markets` answers with a bare array; older deployments wrapped it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GammaMarketsResponse {
    List(Vec<serde_json::Value>),
    Wrapped {
        #[serde(default)]
        data: Option<Vec<serde_json::Value>>,
        #[serde(default)]
        markets: Option<Vec<serde_json::Value>>,
    },
}

impl GammaMarketsResponse {
    /// Raw market objects, left unparsed so one bad entry can be skipped
    pub fn into_values(self) -> Vec<serde_json::Value> {
        match self {
            GammaMarketsResponse::List(values) => values,
            GammaMarketsResponse::Wrapped { data, markets } => {
                data.or(markets).unwrap_or_default()
            }
        }
    }
}

// ============================================================================
// CLOB Order Types
// ============================================================================

/// Body of an order submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequestBody {
    pub token_id: String,
    /// Always "BUY"; the bot never sells
    pub side: String,
    pub price: Decimal,
    pub size: Decimal,
    /// Fill-or-kill so a partial fill never reaches the position book
    pub order_type: String,
}

/// Response from an order submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(rename = "orderID", alias = "orderId", default)]
    pub order_id: Option<String>,
    #[serde(rename = "errorMsg", default)]
    pub error_msg: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// ============================================================================
// WebSocket Market Channel Types
// ============================================================================

/// WebSocket channel types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Market,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Market => write!(f, "market"),
        }
    }
}

/// Initial subscribe message for the market channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsSubscribeMessage {
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub assets_ids: Vec<String>,
}

/// Subscribe operation for tokens added after the initial subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsOperationMessage {
    /// "subscribe" or "unsubscribe"
    pub operation: String,
    pub assets_ids: Vec<String>,
}

/// Book snapshot event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookUpdateEvent {
    pub event_type: Option<String>,
    pub asset_id: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
}

/// A price level in the book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: String,
    pub size: String,
}

/// Price change event
///
/// Newer feeds send `price_changes` with one entry per asset; older ones put
/// `asset_id` on the event and list `changes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChangeEvent {
    pub event_type: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default, alias = "price_changes")]
    pub changes: Vec<PriceChange>,
}

/// A single price change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChange {
    #[serde(default)]
    pub asset_id: Option<String>,
    pub price: String,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub best_bid: Option<String>,
    #[serde(default)]
    pub best_ask: Option<String>,
}

/// Last trade price event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastTradePriceEvent {
    pub event_type: Option<String>,
    pub asset_id: String,
    #[serde(default)]
    pub market: Option<String>,
    pub price: String,
}
