//! Configuration types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::common::errors::{BotError, Result};

/// Main application configuration
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Polymarket-specific configuration
    #[serde(default)]
    pub polymarket: PolymarketConfig,
    /// Polling loop and persistence settings
    #[serde(default)]
    pub bot: BotSettings,
    /// Strategies, evaluated in this order every cycle
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl AppConfig {
    /// Check the configuration for unusable values
    ///
    /// Returns warnings for settings that are legal but worth flagging, and an
    /// error for settings the bot cannot run with.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        if self.bot.dry_run {
            warnings.push("Running in DRY RUN mode - no real trades will be executed".to_string());
        } else if self.polymarket.credentials().is_none() {
            return Err(BotError::Configuration(
                "live trading requires POLYMARKET api_key, api_secret and api_passphrase".to_string(),
            ));
        }

        if self.bot.poll_interval_seconds == 0 {
            return Err(BotError::Configuration(
                "poll_interval_seconds must be at least 1".to_string(),
            ));
        }
        if self.bot.poll_interval_seconds < 10 {
            warnings.push(format!(
                "poll interval of {}s is very low - may cause rate limiting",
                self.bot.poll_interval_seconds
            ));
        }

        for strategy in &self.strategies {
            strategy.validate()?;
        }
        if !self.strategies.iter().any(|s| s.enabled) {
            return Err(BotError::Configuration(
                "no strategies enabled - enable at least one strategy".to_string(),
            ));
        }

        Ok(warnings)
    }
}

/// Polymarket platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolymarketConfig {
    /// API key for authenticated requests
    #[serde(default)]
    pub api_key: Option<String>,
    /// API secret for signing requests
    #[serde(default)]
    pub api_secret: Option<String>,
    /// API passphrase
    #[serde(default)]
    pub api_passphrase: Option<String>,
    /// Base URL for the CLOB REST API
    #[serde(default = "default_polymarket_rest_url")]
    pub rest_url: String,
    /// WebSocket URL for real-time data
    #[serde(default = "default_polymarket_ws_url")]
    pub websocket_url: String,
    /// Gamma API URL for market discovery
    #[serde(default = "default_polymarket_gamma_url")]
    pub gamma_url: String,
    /// Endpoint that accepts buy orders (signing happens behind it)
    #[serde(default = "default_polymarket_order_url")]
    pub order_url: String,
}

impl PolymarketConfig {
    /// Credentials, if all three parts are configured
    pub fn credentials(&self) -> Option<ApiCredentials> {
        match (&self.api_key, &self.api_secret, &self.api_passphrase) {
            (Some(key), Some(secret), Some(passphrase)) => Some(ApiCredentials::new(
                key.clone(),
                secret.clone(),
                passphrase.clone(),
            )),
            _ => None,
        }
    }
}

impl Default for PolymarketConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            api_passphrase: None,
            rest_url: default_polymarket_rest_url(),
            websocket_url: default_polymarket_ws_url(),
            gamma_url: default_polymarket_gamma_url(),
            order_url: default_polymarket_order_url(),
        }
    }
}

fn default_polymarket_rest_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_polymarket_ws_url() -> String {
    "wss://ws-subscriptions-clob.polymarket.com".to_string()
}

fn default_polymarket_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_polymarket_order_url() -> String {
    "https://clob.polymarket.com/order".to_string()
}

/// Which markets the bot polls each cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MarketScope {
    /// Every active market, paginated
    All {
        #[serde(default = "default_page_size")]
        page_size: u32,
        #[serde(default = "default_max_markets")]
        max_markets: usize,
    },
    /// Bitcoin 15-minute UP/DOWN markets around the current window
    #[serde(rename = "btc_15m")]
    Btc15m {
        #[serde(default = "default_lookahead")]
        lookahead: u32,
    },
}

impl Default for MarketScope {
    fn default() -> Self {
        MarketScope::All {
            page_size: default_page_size(),
            max_markets: default_max_markets(),
        }
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_max_markets() -> usize {
    2000
}

fn default_lookahead() -> u32 {
    4
}

/// Polling loop and persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Log trades instead of submitting them
    #[serde(default = "default_true")]
    pub dry_run: bool,
    /// Seconds to sleep between cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Market universe
    #[serde(default)]
    pub scope: MarketScope,
    /// Position book file
    #[serde(default = "default_positions_path")]
    pub positions_path: PathBuf,
    /// Paper trade ledger file (dry-run only)
    #[serde(default = "default_paper_trades_path")]
    pub paper_trades_path: PathBuf,
    /// Subscribe to the market WebSocket for price hints
    #[serde(default)]
    pub use_websocket: bool,
    /// WebSocket prices older than this are ignored in favour of REST
    #[serde(default = "default_price_staleness")]
    pub price_staleness_seconds: u64,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            dry_run: true,
            poll_interval_seconds: default_poll_interval(),
            scope: MarketScope::default(),
            positions_path: default_positions_path(),
            paper_trades_path: default_paper_trades_path(),
            use_websocket: false,
            price_staleness_seconds: default_price_staleness(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    60
}

fn default_positions_path() -> PathBuf {
    PathBuf::from("positions.json")
}

fn default_paper_trades_path() -> PathBuf {
    PathBuf::from("paper_trades.json")
}

fn default_price_staleness() -> u64 {
    30
}

/// One configured strategy instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Disabled strategies are not built
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Shares per proposed trade
    #[serde(default = "default_shares")]
    pub shares: u64,
    /// The rule and its thresholds
    #[serde(flatten)]
    pub rule: StrategyRule,
}

impl StrategyConfig {
    pub fn new(shares: u64, rule: StrategyRule) -> Self {
        Self {
            enabled: true,
            shares,
            rule,
        }
    }

    /// The strategy set for BTC 15-minute markets
    pub fn btc_15min_defaults() -> Vec<StrategyConfig> {
        vec![
            Self::new(10, StrategyRule::PriceArbitrage { deviation_threshold: dec!(0.01) }),
            Self::new(10, StrategyRule::MeanReversion { extreme_threshold: dec!(0.55) }),
            Self::new(10, StrategyRule::SimpleBalanced { min_edge: dec!(0.02) }),
            Self::new(10, StrategyRule::Momentum { momentum_threshold: dec!(0.03) }),
            Self::new(
                10,
                StrategyRule::VolumeSpike {
                    volume_threshold: dec!(2000),
                    min_imbalance: dec!(0.03),
                },
            ),
            Self::new(
                15,
                StrategyRule::TimeBased {
                    minutes_before_close: dec!(5),
                    min_edge: dec!(0.01),
                },
            ),
        ]
    }

    fn validate(&self) -> Result<()> {
        if self.shares == 0 {
            return Err(BotError::Configuration(format!(
                "strategy {} must trade at least one share",
                self.rule.name()
            )));
        }

        let price_thresholds: Vec<Decimal> = match &self.rule {
            StrategyRule::PriceArbitrage { deviation_threshold } => vec![*deviation_threshold],
            StrategyRule::MeanReversion { extreme_threshold } => vec![*extreme_threshold],
            StrategyRule::SimpleBalanced { min_edge } => vec![*min_edge],
            StrategyRule::Momentum { momentum_threshold } => vec![*momentum_threshold],
            StrategyRule::VolumeSpike { min_imbalance, .. } => vec![*min_imbalance],
            StrategyRule::TimeBased { min_edge, .. } => vec![*min_edge],
            StrategyRule::HighConfidenceClose { confidence_threshold, .. } => {
                vec![*confidence_threshold]
            }
        };
        if price_thresholds
            .iter()
            .any(|t| *t < Decimal::ZERO || *t > Decimal::ONE)
        {
            return Err(BotError::Configuration(format!(
                "strategy {} has a price threshold outside [0, 1]",
                self.rule.name()
            )));
        }
        Ok(())
    }
}

fn default_shares() -> u64 {
    10
}

/// Threshold rule of a strategy, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyRule {
    PriceArbitrage {
        #[serde(default = "default_deviation_threshold")]
        deviation_threshold: Decimal,
    },
    MeanReversion {
        #[serde(default = "default_extreme_threshold")]
        extreme_threshold: Decimal,
    },
    SimpleBalanced {
        #[serde(default = "default_balanced_edge")]
        min_edge: Decimal,
    },
    Momentum {
        #[serde(default = "default_momentum_threshold")]
        momentum_threshold: Decimal,
    },
    VolumeSpike {
        #[serde(default = "default_volume_threshold")]
        volume_threshold: Decimal,
        #[serde(default = "default_min_imbalance")]
        min_imbalance: Decimal,
    },
    TimeBased {
        #[serde(default = "default_minutes_before_close")]
        minutes_before_close: Decimal,
        #[serde(default = "default_late_edge")]
        min_edge: Decimal,
    },
    HighConfidenceClose {
        #[serde(default = "default_hours_until_close")]
        hours_until_close: Decimal,
        #[serde(default = "default_confidence_threshold")]
        confidence_threshold: Decimal,
        #[serde(default)]
        min_volume: Decimal,
    },
}

impl StrategyRule {
    /// Display name used in logs and on every intent
    pub fn name(&self) -> &'static str {
        match self {
            StrategyRule::PriceArbitrage { .. } => "PriceArbitrage",
            StrategyRule::MeanReversion { .. } => "MeanReversion",
            StrategyRule::SimpleBalanced { .. } => "SimpleBalanced",
            StrategyRule::Momentum { .. } => "Momentum",
            StrategyRule::VolumeSpike { .. } => "VolumeSpike",
            StrategyRule::TimeBased { .. } => "TimeBased",
            StrategyRule::HighConfidenceClose { .. } => "HighConfidenceClose",
        }
    }
}

fn default_deviation_threshold() -> Decimal {
    dec!(0.01)
}

fn default_extreme_threshold() -> Decimal {
    dec!(0.55)
}

fn default_balanced_edge() -> Decimal {
    dec!(0.02)
}

fn default_momentum_threshold() -> Decimal {
    dec!(0.03)
}

fn default_volume_threshold() -> Decimal {
    dec!(2000)
}

fn default_min_imbalance() -> Decimal {
    dec!(0.03)
}

fn default_minutes_before_close() -> Decimal {
    dec!(5)
}

fn default_late_edge() -> Decimal {
    dec!(0.01)
}

fn default_hours_until_close() -> Decimal {
    dec!(1)
}

fn default_confidence_threshold() -> Decimal {
    dec!(0.85)
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Initial delay between reconnection attempts in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Upper bound for the reconnection backoff in milliseconds
    #[serde(default = "default_max_reconnect_delay")]
    pub max_reconnect_delay_ms: u64,
    /// Maximum reconnection attempts (0 = infinite)
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Heartbeat/ping interval in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            reconnect_delay_ms: default_reconnect_delay(),
            max_reconnect_delay_ms: default_max_reconnect_delay(),
            max_reconnect_attempts: 0,
            heartbeat_interval_seconds: default_heartbeat_interval(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reconnect_delay() -> u64 {
    5000
}

fn default_max_reconnect_delay() -> u64 {
    60_000
}

fn default_heartbeat_interval() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    10
}

/// API credentials for authenticated requests
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

impl ApiCredentials {
    pub fn new(api_key: String, api_secret: String, passphrase: String) -> Self {
        Self {
            api_key,
            api_secret,
            passphrase,
        }
    }
}
