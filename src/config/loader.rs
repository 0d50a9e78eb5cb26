//! Configuration loader

use config::{Config, Environment, File, FileFormat};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

use super::types::{AppConfig, StrategyConfig, StrategyRule};
use crate::common::errors::{BotError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP_, `__` between sections)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    build(builder)
}

/// Load configuration from a TOML string
pub fn load_from_str(toml: &str) -> Result<AppConfig> {
    build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
}

fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<AppConfig> {
    let config = builder
        .build()
        .map_err(|e| BotError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| BotError::Configuration(e.to_string()))
}

/// Load configuration from the flat `DRY_RUN` / `CHECK_INTERVAL` / `HCC_*` environment variables
///
/// Runs the high-confidence-close strategy unless `HCC_ENABLED=false`.
pub fn load_from_env() -> Result<AppConfig> {
    // Try to load from .env file
    dotenvy::dotenv().ok();

    let mut config = AppConfig::default();

    config.polymarket.api_key = std::env::var("POLYMARKET_API_KEY").ok();
    config.polymarket.api_secret = std::env::var("POLYMARKET_API_SECRET").ok();
    config.polymarket.api_passphrase = std::env::var("POLYMARKET_API_PASSPHRASE").ok();
    if let Ok(url) = std::env::var("POLYMARKET_REST_URL") {
        config.polymarket.rest_url = url;
    }
    if let Ok(url) = std::env::var("POLYMARKET_WS_URL") {
        config.polymarket.websocket_url = url;
    }
    if let Ok(url) = std::env::var("POLYMARKET_GAMMA_URL") {
        config.polymarket.gamma_url = url;
    }

    config.bot.dry_run = env_bool("DRY_RUN", true);
    config.bot.poll_interval_seconds = env_parse("CHECK_INTERVAL", 60)?;
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        config.settings.log_level = level.to_lowercase();
    }

    if env_bool("HCC_ENABLED", true) {
        config.strategies.push(StrategyConfig::new(
            env_parse("HCC_SHARES_TO_BUY", 1)?,
            StrategyRule::HighConfidenceClose {
                hours_until_close: env_parse("HCC_HOURS_UNTIL_CLOSE", Decimal::from(720))?,
                confidence_threshold: env_parse("HCC_CONFIDENCE_THRESHOLD", Decimal::new(85, 2))?,
                min_volume: env_parse("HCC_MIN_VOLUME", Decimal::from(100))?,
            },
        ));
    }

    Ok(config)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| BotError::Configuration(format!("invalid {}='{}': {}", key, raw, e))),
        Err(_) => Ok(default),
    }
}
