//! REST client for the Polymarket Gamma API

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::messages::*;
use crate::common::errors::{BotError, Result};
use crate::common::types::{MarketSnapshot, Side};

/// Gamma never returns more than this many markets per page
pub const MAX_PAGE_SIZE: u32 = 100;

/// REST client for Gamma market discovery and resolution
#[derive(Debug, Clone)]
pub struct PolymarketRestClient {
    /// HTTP client
    client: Client,
    /// Base URL for the Gamma API
    gamma_url: String,
}

impl PolymarketRestClient {
    /// Create a new REST client
    pub fn new(gamma_url: &str) -> Result<Self> {
        Self::with_timeout(gamma_url, Duration::from_secs(10))
    }

    /// Create a new REST client with custom timeout
    pub fn with_timeout(gamma_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            gamma_url: gamma_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch one page of open markets
    ///
    /// Entries that fail to parse are logged and skipped.
    #[instrument(skip(self))]
    pub async fn fetch_markets_page(&self, limit: u32, offset: usize) -> Result<Vec<GammaMarket>> {
        let url = format!("{}/markets", self.gamma_url);
        let limit = limit.min(MAX_PAGE_SIZE).to_string();
        let offset = offset.to_string();
        debug!("Fetching markets from Gamma API: {} offset={}", url, offset);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
                ("closed", "false"),
                ("active", "true"),
            ])
            .send()
            .await?;

        let payload: GammaMarketsResponse = check_status(response).await?.json().await?;
        Ok(parse_markets(payload.into_values()))
    }

    /// Fetch every open market, page by page, up to `max_markets`
    #[instrument(skip(self))]
    pub async fn fetch_all_markets(
        &self,
        page_size: u32,
        max_markets: usize,
    ) -> Result<Vec<GammaMarket>> {
        let batch = page_size.clamp(1, MAX_PAGE_SIZE);
        let mut markets = Vec::new();
        let mut offset = 0usize;
        let mut pages = 0u32;

        loop {
            let page = self.fetch_markets_page(batch, offset).await?;
            pages += 1;
            let received = page.len();
            markets.extend(page);

            if markets.len() >= max_markets {
                markets.truncate(max_markets);
                break;
            }
            if received < batch as usize {
                break;
            }
            offset += batch as usize;
        }

        debug!("Fetched {} markets in {} pages", markets.len(), pages);
        Ok(markets)
    }

    /// Look up a market by slug; `None` if Gamma does not know it yet
    #[instrument(skip(self))]
    pub async fn fetch_market_by_slug(&self, slug: &str) -> Result<Option<GammaMarket>> {
        let url = format!("{}/markets", self.gamma_url);
        debug!("Fetching market by slug: {}", slug);

        let response = self
            .client
            .get(&url)
            .query(&[("slug", slug), ("limit", "1")])
            .send()
            .await?;

        let payload: GammaMarketsResponse = check_status(response).await?.json().await?;
        Ok(parse_markets(payload.into_values()).into_iter().next())
    }

    /// Fetch a single market by its Gamma id
    #[instrument(skip(self))]
    pub async fn fetch_market(&self, market_id: &str) -> Result<GammaMarket> {
        let url = format!("{}/markets/{}", self.gamma_url, market_id);
        debug!("Fetching market from: {}", url);

        let response = self.client.get(&url).send().await?;
        let market: GammaMarket = check_status(response).await?.json().await?;
        Ok(market)
    }
}

/// Map a non-success status to the matching error
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_seconds = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(BotError::RateLimit {
            message: format!("Gamma API returned status {}", status),
            retry_after_seconds,
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(BotError::Api(format!(
        "Gamma API returned status {}: {}",
        status, body
    )))
}

fn parse_markets(values: Vec<serde_json::Value>) -> Vec<GammaMarket> {
    values
        .into_iter()
        .filter_map(|value| {
            let id = value.get("id").cloned();
            match serde_json::from_value::<GammaMarket>(value) {
                Ok(market) => Some(market),
                Err(e) => {
                    debug!("Failed to parse market {:?}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

/// Parse Gamma's `endDate`: RFC 3339, or a bare date meaning midnight UTC
pub fn parse_end_date(raw: &str) -> Option<DateTime<Utc>> {
    if raw.contains('T') {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    } else {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt))
    }
}

/// Prices outside [0, 1] are treated like unparseable ones
fn unit_price(price: Decimal) -> Option<Decimal> {
    (price >= Decimal::ZERO && price <= Decimal::ONE).then_some(price)
}

fn parse_price(raw: Option<&String>) -> Option<Decimal> {
    raw.and_then(|s| s.trim().parse::<Decimal>().ok())
        .and_then(unit_price)
}

/// Convert a Gamma market into a snapshot the strategies can evaluate
///
/// Returns `None` for markets that are closed, archived, inactive, past their
/// close time, or carry no positive price at all.
pub fn to_snapshot(market: &GammaMarket, now: DateTime<Utc>) -> Option<MarketSnapshot> {
    if market.is_closed() || market.is_archived() {
        return None;
    }

    let close_time = match market.end_date.as_deref().and_then(parse_end_date) {
        Some(close_time) => close_time,
        None => {
            debug!(market_id = %market.id, "Market missing or unparseable end date");
            return None;
        }
    };
    if close_time < now {
        return None;
    }

    let outcome_prices = market.outcome_prices();
    let (mut yes_price, mut no_price) = if outcome_prices.len() >= 2 {
        (
            parse_price(outcome_prices.first()),
            parse_price(outcome_prices.get(1)),
        )
    } else {
        (None, None)
    };

    let is_zero = |p: Option<Decimal>| p.map_or(true, |p| p.is_zero());
    if is_zero(yes_price) && is_zero(no_price) {
        if market.best_bid.is_some() || market.best_ask.is_some() {
            yes_price = market.best_bid.and_then(unit_price);
            no_price = market.best_ask.and_then(unit_price);
        }
    }

    let has_price = [yes_price, no_price]
        .iter()
        .any(|p| p.map_or(false, |p| p > Decimal::ZERO));
    if !market.is_active() || !has_price {
        return None;
    }

    let token_ids = market.token_ids();

    Some(MarketSnapshot {
        market_id: market.id.clone(),
        question: market.question.clone(),
        yes_price,
        no_price,
        volume: market.volume_num.unwrap_or(Decimal::ZERO),
        close_time,
        yes_token_id: token_ids.first().cloned(),
        no_token_id: token_ids.get(1).cloned(),
    })
}

/// Winning side of a closed market, if Gamma reports a clean 1/0 outcome
pub fn resolution(market: &GammaMarket) -> Option<Side> {
    if !market.is_closed() {
        return None;
    }

    let prices = market.outcome_prices();
    if prices.len() < 2 {
        warn!(market_id = %market.id, "Closed market has no outcome prices");
        return None;
    }

    let yes = parse_price(prices.first())?;
    let no = parse_price(prices.get(1))?;
    if yes == Decimal::ONE && no.is_zero() {
        Some(Side::Yes)
    } else if no == Decimal::ONE && yes.is_zero() {
        Some(Side::No)
    } else {
        None
    }
}
