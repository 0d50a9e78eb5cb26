//! Configuration loading and types

pub mod loader;
pub mod types;

pub use loader::{load_config, load_from_env, load_from_str};
pub use types::{
    ApiCredentials, AppConfig, AppSettings, BotSettings, MarketScope, PolymarketConfig,
    StrategyConfig, StrategyRule,
};
