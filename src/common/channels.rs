//! Channel type definitions for inter-task communication

use tokio::sync::mpsc;

use super::types::{PriceUpdate, TokenRef};

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// Buffer for token-tracking commands sent to the price feed
pub const TRACK_CHANNEL_SIZE: usize = 64;

/// Subscription changes sent to the price feed
#[derive(Debug, Clone, PartialEq)]
pub enum FeedCommand {
    /// Start tracking these tokens
    Track(Vec<TokenRef>),
    /// Drop every token of these markets
    Untrack(Vec<String>),
}

/// Create a new price update channel with the default buffer size
pub fn create_price_channel() -> (mpsc::Sender<PriceUpdate>, mpsc::Receiver<PriceUpdate>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

/// Create a new price update channel with a custom buffer size
pub fn create_price_channel_with_size(
    size: usize,
) -> (mpsc::Sender<PriceUpdate>, mpsc::Receiver<PriceUpdate>) {
    mpsc::channel(size)
}

/// Create the channel used to change the price feed's subscriptions
pub fn create_track_channel() -> (mpsc::Sender<FeedCommand>, mpsc::Receiver<FeedCommand>) {
    mpsc::channel(TRACK_CHANNEL_SIZE)
}
