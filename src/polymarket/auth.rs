//! L2 (API key) authentication headers for the Polymarket CLOB

use base64::{engine::general_purpose::URL_SAFE as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::common::errors::{BotError, Result};
use crate::config::types::ApiCredentials;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over `timestamp + METHOD + path + body`, URL-safe base64
///
/// The secret is itself URL-safe base64 encoded.
pub fn sign_request(
    secret: &str,
    timestamp: i64,
    method: &str,
    request_path: &str,
    body: &str,
) -> Result<String> {
    let secret_bytes = BASE64
        .decode(secret)
        .map_err(|e| BotError::Authentication(format!("Failed to decode secret: {}", e)))?;

    let message = format!("{}{}{}{}", timestamp, method.to_uppercase(), request_path, body);

    let mut mac = HmacSha256::new_from_slice(&secret_bytes)
        .map_err(|e| BotError::Authentication(format!("Failed to create HMAC: {}", e)))?;
    mac.update(message.as_bytes());

    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Authentication headers for one request
#[derive(Debug, Clone)]
pub struct AuthHeaders {
    pub api_key: String,
    pub signature: String,
    pub timestamp: i64,
    pub passphrase: String,
}

impl AuthHeaders {
    /// Sign a request at the given timestamp
    pub fn sign(
        credentials: &ApiCredentials,
        timestamp: i64,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> Result<Self> {
        Ok(Self {
            api_key: credentials.api_key.clone(),
            signature: sign_request(&credentials.api_secret, timestamp, method, request_path, body)?,
            timestamp,
            passphrase: credentials.passphrase.clone(),
        })
    }

    /// Sign a request stamped with the current time
    pub fn sign_now(
        credentials: &ApiCredentials,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> Result<Self> {
        Self::sign(
            credentials,
            chrono::Utc::now().timestamp(),
            method,
            request_path,
            body,
        )
    }

    /// Add the POLY_* headers to a request
    pub fn apply_to_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("POLY_API_KEY", &self.api_key)
            .header("POLY_SIGNATURE", &self.signature)
            .header("POLY_TIMESTAMP", self.timestamp.to_string())
            .header("POLY_PASSPHRASE", &self.passphrase)
    }
}
