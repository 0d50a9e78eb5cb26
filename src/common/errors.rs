//! Error types for the bot

use thiserror::Error;

/// Result type alias using our BotError
pub type Result<T> = std::result::Result<T, BotError>;

/// Main error type for the bot
///
/// The variants follow the stage that produced them so the orchestrator can
/// decide whether a failure is isolated, aborts the current cycle, or is fatal.
#[derive(Error, Debug)]
pub enum BotError {
    /// Transport-level failures (connection refused, timeouts, DNS)
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded: {message}, retry after {retry_after_seconds:?} seconds")]
    RateLimit {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    /// The API answered, but with an error status or a body we could not use
    #[error("API error: {0}")]
    Api(String),

    /// A single strategy failed to evaluate
    #[error("Strategy '{strategy}' failed: {message}")]
    Strategy { strategy: String, message: String },

    /// Order submission failed for one intent
    #[error("Order for market {market_id} failed: {message}")]
    Order { market_id: String, message: String },

    /// The position book or paper ledger could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// WebSocket connection or communication errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BotError {
    /// Build a strategy error tagged with the strategy name
    pub fn strategy(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        BotError::Strategy {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    /// Build an order error tagged with the market id
    pub fn order(market_id: impl Into<String>, message: impl Into<String>) -> Self {
        BotError::Order {
            market_id: market_id.into(),
            message: message.into(),
        }
    }

    /// Errors that are expected to clear up by the next scheduled cycle
    pub fn is_transient(&self) -> bool {
        matches!(self, BotError::Network(_) | BotError::RateLimit { .. })
    }

    /// Errors after which the bot must not start another cycle
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Persistence(_))
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BotError::Api(format!("malformed response body: {}", err))
        } else if let Some(status) = err.status() {
            BotError::Api(format!("server returned status {}: {}", status, err))
        } else {
            BotError::Network(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BotError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        BotError::WebSocket(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(BotError::Network("timeout".into()).is_transient());
        assert!(BotError::RateLimit {
            message: "slow down".into(),
            retry_after_seconds: Some(3),
        }
        .is_transient());
        assert!(!BotError::Api("bad body".into()).is_transient());

        assert!(BotError::Persistence("disk full".into()).is_fatal());
        assert!(!BotError::order("m1", "rejected").is_fatal());
        assert!(!BotError::strategy("momentum", "boom").is_fatal());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = BotError::order("0xabc", "insufficient balance");
        assert_eq!(
            err.to_string(),
            "Order for market 0xabc failed: insufficient balance"
        );

        let err = BotError::strategy("MeanReversion", "bad threshold");
        assert!(err.to_string().contains("MeanReversion"));
    }
}
