//! WebSocket price feed for the Polymarket market channel
//!
//! The feed is a hint source only: it pushes [`PriceUpdate`]s into a channel
//! that the orchestrator drains without ever waiting on it.

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, instrument, warn};

use super::messages::*;
use crate::common::channels::{create_track_channel, FeedCommand};
use crate::common::errors::Result;
use crate::common::types::{ConnectionStatus, PriceUpdate, TokenRef};
use crate::config::types::AppSettings;

/// Exponential backoff between reconnection attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// 0 means retry forever
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            initial_delay: Duration::from_millis(settings.reconnect_delay_ms),
            max_delay: Duration::from_millis(settings.max_reconnect_delay_ms),
            max_attempts: settings.max_reconnect_attempts,
        }
    }

    /// Delay before the given attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    pub fn gives_up_after(&self, attempt: u32) -> bool {
        self.max_attempts != 0 && attempt > self.max_attempts
    }
}

/// How a single connection ended
enum SessionEnd {
    /// Handle dropped or update receiver gone; stop for good
    Shutdown,
    /// Server closed or the stream ended; reconnect
    Disconnected(Option<String>),
}

/// Market-channel subscriber that maps CLOB token prices to market sides
pub struct PriceFeed {
    /// Full WebSocket URL including `/ws/market`
    url: String,
    heartbeat_interval: Duration,
    policy: ReconnectPolicy,
    /// Tracked tokens by asset id
    tokens: HashMap<String, TokenRef>,
}

/// Control handle for a spawned [`PriceFeed`]
pub struct PriceFeedHandle {
    track_tx: mpsc::Sender<FeedCommand>,
    status: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl PriceFeedHandle {
    /// Start tracking more tokens; never blocks
    pub fn track(&self, tokens: Vec<TokenRef>) {
        if tokens.is_empty() {
            return;
        }
        if let Err(e) = self.track_tx.try_send(FeedCommand::Track(tokens)) {
            warn!("Price feed did not accept new tokens: {}", e);
        }
    }

    /// Stop tracking the tokens of settled markets; never blocks
    pub fn untrack(&self, market_ids: Vec<String>) {
        if market_ids.is_empty() {
            return;
        }
        if let Err(e) = self.track_tx.try_send(FeedCommand::Untrack(market_ids)) {
            warn!("Price feed did not accept an untrack request: {}", e);
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.status.borrow(), ConnectionStatus::Connected)
    }

    /// Stop the feed task
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl PriceFeed {
    /// Create a feed for the market channel under `websocket_url`
    pub fn new(websocket_url: &str, settings: &AppSettings) -> Self {
        Self {
            url: format!("{}/ws/market", websocket_url.trim_end_matches('/')),
            heartbeat_interval: Duration::from_secs(settings.heartbeat_interval_seconds.max(1)),
            policy: ReconnectPolicy::from_settings(settings),
            tokens: HashMap::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Spawn the feed; updates go to `updates` until the handle is dropped
    pub fn spawn(self, updates: mpsc::Sender<PriceUpdate>) -> PriceFeedHandle {
        let (track_tx, track_rx) = create_track_channel();
        let (status_tx, status_rx) =
            watch::channel(ConnectionStatus::Disconnected(Some("not started".to_string())));

        let task = tokio::spawn(self.run(updates, track_rx, status_tx));

        PriceFeedHandle {
            track_tx,
            status: status_rx,
            task,
        }
    }

    /// Returns the asset ids that were not tracked before
    fn add_tokens(&mut self, tokens: Vec<TokenRef>) -> Vec<String> {
        let mut added = Vec::new();
        for token in tokens {
            if !self.tokens.contains_key(&token.asset_id) {
                added.push(token.asset_id.clone());
                self.tokens.insert(token.asset_id.clone(), token);
            }
        }
        added
    }

    /// Returns the asset ids that belonged to the given markets
    fn remove_markets(&mut self, market_ids: &[String]) -> Vec<String> {
        let removed: Vec<String> = self
            .tokens
            .values()
            .filter(|token| market_ids.contains(&token.market_id))
            .map(|token| token.asset_id.clone())
            .collect();
        for asset_id in &removed {
            self.tokens.remove(asset_id);
        }
        removed
    }

    fn apply(&mut self, command: FeedCommand) -> Option<WsOperationMessage> {
        let (operation, assets_ids) = match command {
            FeedCommand::Track(tokens) => ("subscribe", self.add_tokens(tokens)),
            FeedCommand::Untrack(market_ids) => ("unsubscribe", self.remove_markets(&market_ids)),
        };
        if assets_ids.is_empty() {
            return None;
        }
        Some(WsOperationMessage {
            operation: operation.to_string(),
            assets_ids,
        })
    }

    async fn run(
        mut self,
        updates: mpsc::Sender<PriceUpdate>,
        mut track_rx: mpsc::Receiver<FeedCommand>,
        status_tx: watch::Sender<ConnectionStatus>,
    ) {
        let mut attempt = 0u32;

        loop {
            // Nothing to subscribe to yet
            while self.tokens.is_empty() {
                match track_rx.recv().await {
                    Some(command) => {
                        self.apply(command);
                    }
                    None => return,
                }
            }

            let mut connected = false;
            let outcome = self
                .session(&updates, &mut track_rx, &status_tx, &mut connected)
                .await;
            if connected {
                attempt = 0;
            }

            match outcome {
                Ok(SessionEnd::Shutdown) => {
                    info!("Price feed stopped");
                    let _ = status_tx.send(ConnectionStatus::Disconnected(None));
                    return;
                }
                Ok(SessionEnd::Disconnected(reason)) => {
                    info!("Price feed disconnected: {:?}", reason);
                    let _ = status_tx.send(ConnectionStatus::Disconnected(reason));
                }
                Err(e) => {
                    error!("Price feed error: {}", e);
                    let _ = status_tx.send(ConnectionStatus::Error(e.to_string()));
                }
            }

            attempt += 1;
            if self.policy.gives_up_after(attempt) {
                error!("Price feed giving up after {} reconnection attempts", attempt - 1);
                return;
            }

            let delay = self.policy.delay_for(attempt);
            let _ = status_tx.send(ConnectionStatus::Reconnecting { attempt });
            warn!("Reconnecting price feed in {:?} (attempt {})", delay, attempt);
            sleep(delay).await;
        }
    }

    #[instrument(skip_all, fields(url = %self.url))]
    async fn session(
        &mut self,
        updates: &mpsc::Sender<PriceUpdate>,
        track_rx: &mut mpsc::Receiver<FeedCommand>,
        status_tx: &watch::Sender<ConnectionStatus>,
        connected: &mut bool,
    ) -> Result<SessionEnd> {
        info!("Connecting to Polymarket WebSocket");
        let (ws_stream, _response) = connect_async(&self.url).await?;
        *connected = true;
        let _ = status_tx.send(ConnectionStatus::Connected);

        let (mut write, mut read) = ws_stream.split();

        let subscribe = WsSubscribeMessage {
            channel_type: ChannelType::Market,
            assets_ids: self.tokens.keys().cloned().collect(),
        };
        let msg_json = serde_json::to_string(&subscribe)?;
        debug!("Sending subscription message: {}", msg_json);
        write.send(Message::Text(msg_json)).await?;
        info!("Subscribed to {} tokens", self.tokens.len());

        let mut ping_interval = interval(self.heartbeat_interval);
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately
        ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if text.eq_ignore_ascii_case("pong") {
                                continue;
                            }
                            let parsed = match parse_message(&text, &self.tokens) {
                                Ok(parsed) => parsed,
                                Err(e) => {
                                    debug!("Ignoring unparseable message: {} - {}", e, text);
                                    continue;
                                }
                            };
                            for update in parsed {
                                match updates.try_send(update) {
                                    Ok(()) => {}
                                    Err(mpsc::error::TrySendError::Full(_)) => {
                                        debug!("Price update channel full, dropping update");
                                    }
                                    Err(mpsc::error::TrySendError::Closed(_)) => {
                                        return Ok(SessionEnd::Shutdown);
                                    }
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            return Ok(SessionEnd::Disconnected(frame.map(|f| f.reason.to_string())));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(SessionEnd::Disconnected(None)),
                    }
                }
                command = track_rx.recv() => {
                    match command {
                        Some(command) => {
                            if let Some(op) = self.apply(command) {
                                write.send(Message::Text(serde_json::to_string(&op)?)).await?;
                                debug!("{}: now tracking {} tokens", op.operation, self.tokens.len());
                            }
                        }
                        None => {
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(SessionEnd::Shutdown);
                        }
                    }
                }
                _ = ping_interval.tick() => {
                    write.send(Message::Text("PING".to_string())).await?;
                }
            }
        }
    }
}

/// Parse a market-channel message into price updates for tracked tokens
///
/// Accepts a single event object or an array of them. Unknown event types and
/// untracked tokens produce nothing.
pub fn parse_message(text: &str, tokens: &HashMap<String, TokenRef>) -> Result<Vec<PriceUpdate>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let events = match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };

    let mut prices: Vec<(String, Decimal)> = Vec::new();
    for event in events {
        let event_type = event
            .get("event_type")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        match event_type.as_str() {
            "book" => {
                let book: BookUpdateEvent = serde_json::from_value(event)?;
                if let Some(mid) = book_midpoint(&book) {
                    prices.push((book.asset_id, mid));
                }
            }
            "price_change" => {
                let change_event: PriceChangeEvent = serde_json::from_value(event)?;
                for change in change_event.changes {
                    let asset_id = match change.asset_id.as_ref().or(change_event.asset_id.as_ref()) {
                        Some(asset_id) => asset_id.clone(),
                        None => continue,
                    };
                    let best_bid = parse_decimal(change.best_bid.as_deref());
                    let best_ask = parse_decimal(change.best_ask.as_deref());
                    let quoted = match (best_bid, best_ask) {
                        (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
                        _ => parse_decimal(Some(change.price.as_str())),
                    };
                    if let Some(price) = quoted {
                        prices.push((asset_id, price));
                    }
                }
            }
            "last_trade_price" => {
                let trade: LastTradePriceEvent = serde_json::from_value(event)?;
                if let Some(price) = parse_decimal(Some(trade.price.as_str())) {
                    prices.push((trade.asset_id, price));
                }
            }
            _ => {}
        }
    }

    let received_at = Utc::now();
    Ok(prices
        .into_iter()
        .filter(|(_, price)| *price >= Decimal::ZERO && *price <= Decimal::ONE)
        .filter_map(|(asset_id, price)| {
            tokens.get(&asset_id).map(|token| PriceUpdate {
                market_id: token.market_id.clone(),
                side: token.side,
                price,
                received_at,
            })
        })
        .collect())
}

fn parse_decimal(raw: Option<&str>) -> Option<Decimal> {
    raw.and_then(|s| s.trim().parse().ok())
}

/// Midpoint of best bid and best ask
fn book_midpoint(book: &BookUpdateEvent) -> Option<Decimal> {
    let best_bid = book
        .bids
        .iter()
        .filter_map(|l| parse_decimal(Some(l.price.as_str())))
        .max()?;
    let best_ask = book
        .asks
        .iter()
        .filter_map(|l| parse_decimal(Some(l.price.as_str())))
        .min()?;
    Some((best_bid + best_ask) / Decimal::TWO)
}
