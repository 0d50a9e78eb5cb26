//! Polymarket module - Gamma market data, order gateway and market-channel price feed

pub mod auth;
pub mod client;
pub mod messages;
pub mod orders;
pub mod rest;
pub mod websocket;

pub use client::PolymarketClient;
pub use orders::OrderGatewayClient;
pub use rest::PolymarketRestClient;
pub use websocket::{PriceFeed, PriceFeedHandle, ReconnectPolicy};
