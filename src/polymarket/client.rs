//! Market data source backed by the Gamma REST API

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};

use super::rest::{self, PolymarketRestClient};
use crate::common::errors::Result;
use crate::common::traits::MarketDataSource;
use crate::common::types::{MarketSnapshot, Side};
use crate::config::types::{MarketScope, PolymarketConfig};

/// Length of one BTC UP/DOWN window in seconds
const BTC_WINDOW_SECONDS: i64 = 900;

/// Polymarket market data client
pub struct PolymarketClient {
    /// REST API client
    rest_client: PolymarketRestClient,
    /// Which markets to return each cycle
    scope: MarketScope,
}

impl PolymarketClient {
    /// Create a new Polymarket client from configuration
    pub fn new(config: &PolymarketConfig, scope: MarketScope, timeout: std::time::Duration) -> Result<Self> {
        let rest_client = PolymarketRestClient::with_timeout(&config.gamma_url, timeout)?;
        Ok(Self { rest_client, scope })
    }

    /// Get a reference to the REST client
    pub fn rest(&self) -> &PolymarketRestClient {
        &self.rest_client
    }

    pub fn scope(&self) -> &MarketScope {
        &self.scope
    }

    async fn fetch_all(&self, page_size: u32, max_markets: usize) -> Result<Vec<MarketSnapshot>> {
        let now = Utc::now();
        let markets = self.rest_client.fetch_all_markets(page_size, max_markets).await?;
        let snapshots: Vec<MarketSnapshot> = markets
            .iter()
            .filter_map(|m| rest::to_snapshot(m, now))
            .collect();

        info!(
            "Fetched {} usable markets out of {} returned",
            snapshots.len(),
            markets.len()
        );
        Ok(snapshots)
    }

    /// BTC 15-minute markets for the previous, current and upcoming windows
    ///
    /// A slug that fails to load is skipped; the fetch only fails when every
    /// lookup failed.
    async fn fetch_btc_15m(&self, lookahead: u32) -> Result<Vec<MarketSnapshot>> {
        let now = Utc::now();
        let mut snapshots = Vec::new();
        let mut last_error = None;
        let mut failures = 0usize;
        let slugs = btc_15m_slugs(now, lookahead);
        let attempted = slugs.len();

        for slug in slugs {
            match self.rest_client.fetch_market_by_slug(&slug).await {
                Ok(Some(market)) => match rest::to_snapshot(&market, now) {
                    Some(snapshot) => {
                        debug!("Found active market: {}", slug);
                        snapshots.push(snapshot);
                    }
                    None => debug!("Market {} exists but is closed or inactive", slug),
                },
                Ok(None) => debug!("Market {} not found (may not be created yet)", slug),
                Err(e) => {
                    warn!(slug = %slug, error = %e, "Failed to fetch BTC market");
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if failures == attempted {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        snapshots.sort_by_key(|s| s.close_time);
        snapshots.truncate(lookahead as usize);
        info!(
            "Found {} active BTC 15-min markets, current window closes in {}s",
            snapshots.len(),
            btc_window_remaining(now).num_seconds()
        );
        Ok(snapshots)
    }
}

/// Slugs of the BTC windows from one before the current through `lookahead` after
///
/// Windows start on 15-minute boundaries and are named by their start time.
pub fn btc_15m_slugs(now: DateTime<Utc>, lookahead: u32) -> Vec<String> {
    let current_start = now.timestamp() - now.timestamp().rem_euclid(BTC_WINDOW_SECONDS);
    (-1..=i64::from(lookahead))
        .map(|i| current_start + i * BTC_WINDOW_SECONDS)
        .map(|start| format!("btc-updown-15m-{}", start))
        .collect()
}

#[async_trait]
impl MarketDataSource for PolymarketClient {
    #[instrument(skip(self))]
    async fn fetch_active_markets(&self) -> Result<Vec<MarketSnapshot>> {
        match self.scope {
            MarketScope::All {
                page_size,
                max_markets,
            } => self.fetch_all(page_size, max_markets).await,
            MarketScope::Btc15m { lookahead } => self.fetch_btc_15m(lookahead).await,
        }
    }

    #[instrument(skip(self))]
    async fn fetch_resolution(&self, market_id: &str) -> Result<Option<Side>> {
        let market = self.rest_client.fetch_market(market_id).await?;
        let winner = rest::resolution(&market);
        if let Some(side) = winner {
            info!(market_id, winner = %side, "Market resolved");
        }
        Ok(winner)
    }
}

/// Time remaining in the current BTC window
pub fn btc_window_remaining(now: DateTime<Utc>) -> Duration {
    let elapsed = now.timestamp().rem_euclid(BTC_WINDOW_SECONDS);
    Duration::seconds(BTC_WINDOW_SECONDS - elapsed)
}
