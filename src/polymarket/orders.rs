//! Order submission through an authenticated order gateway

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{info, instrument, warn};
use url::Url;

use super::auth::AuthHeaders;
use super::messages::{OrderRequestBody, OrderResponse};
use crate::common::errors::{BotError, Result};
use crate::common::traits::{OrderExecutor, OrderReceipt};
use crate::common::types::TradeIntent;
use crate::config::types::ApiCredentials;

/// Posts fill-or-kill buy orders to the gateway with L2 headers
///
/// The gateway owns the wallet and signs the order; this client never sees a
/// private key.
#[derive(Debug, Clone)]
pub struct OrderGatewayClient {
    client: Client,
    order_url: String,
    /// Path component of `order_url`, part of the signed message
    request_path: String,
    credentials: ApiCredentials,
}

impl OrderGatewayClient {
    pub fn new(order_url: &str, credentials: ApiCredentials, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(order_url)
            .map_err(|e| BotError::Configuration(format!("invalid order_url '{}': {}", order_url, e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            order_url: order_url.to_string(),
            request_path: parsed.path().to_string(),
            credentials,
        })
    }

    /// Request body for an intent; fails if the intent has no token id
    pub fn order_body(intent: &TradeIntent) -> Result<OrderRequestBody> {
        let token_id = intent.token_id.clone().ok_or_else(|| {
            BotError::order(
                &intent.market_id,
                format!("no CLOB token id for the {} side", intent.side),
            )
        })?;

        Ok(OrderRequestBody {
            token_id,
            side: "BUY".to_string(),
            price: intent.price,
            size: Decimal::from(intent.quantity),
            order_type: "FOK".to_string(),
        })
    }
}

#[async_trait]
impl OrderExecutor for OrderGatewayClient {
    #[instrument(skip(self, intent), fields(market_id = %intent.market_id, side = %intent.side))]
    async fn submit_order(&self, intent: &TradeIntent) -> Result<OrderReceipt> {
        let market_id = intent.market_id.as_str();
        let body = serde_json::to_string(&Self::order_body(intent)?)
            .map_err(|e| BotError::order(market_id, format!("failed to encode order: {}", e)))?;
        let headers = AuthHeaders::sign_now(&self.credentials, "POST", &self.request_path, &body)
            .map_err(|e| BotError::order(market_id, e.to_string()))?;

        let request = self
            .client
            .post(&self.order_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        let response = headers
            .apply_to_request(request)
            .send()
            .await
            .map_err(|e| BotError::order(market_id, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "Order gateway rejected request");
            return Err(BotError::order(
                market_id,
                format!("gateway returned status {}: {}", status, text),
            ));
        }

        let parsed: OrderResponse = response
            .json()
            .await
            .map_err(|e| BotError::order(market_id, format!("malformed gateway response: {}", e)))?;

        if parsed.success == Some(false) {
            return Err(BotError::order(
                market_id,
                parsed
                    .error_msg
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "order not accepted".to_string()),
            ));
        }

        let order_id = parsed
            .order_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BotError::order(market_id, "gateway returned no order id"))?;

        info!(order_id = %order_id, "Order accepted");
        Ok(OrderReceipt { order_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Side;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn intent(token_id: Option<&str>) -> TradeIntent {
        TradeIntent {
            market_id: "m1".to_string(),
            question: "BTC up?".to_string(),
            side: Side::No,
            quantity: 10,
            price: dec!(0.48),
            strategy: "PriceArbitrage".to_string(),
            reason: "deficit".to_string(),
            close_time: Utc::now(),
            volume: dec!(100),
            token_id: token_id.map(str::to_string),
        }
    }

    #[test]
    fn test_order_body() {
        let body = OrderGatewayClient::order_body(&intent(Some("222"))).unwrap();
        assert_eq!(body.token_id, "222");
        assert_eq!(body.side, "BUY");
        assert_eq!(body.size, dec!(10));
        assert_eq!(body.price, dec!(0.48));
        assert_eq!(body.order_type, "FOK");
    }

    #[test]
    fn test_order_body_requires_token() {
        assert!(matches!(
            OrderGatewayClient::order_body(&intent(None)),
            Err(BotError::Order { .. })
        ));
    }

    #[test]
    fn test_request_path_from_url() {
        let creds = ApiCredentials::new("k".into(), "c2VjcmV0".into(), "p".into());
        let client =
            OrderGatewayClient::new("https://clob.polymarket.com/order", creds, Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.request_path, "/order");
    }
}
