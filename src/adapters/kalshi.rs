//! Kalshi REST client: RSA-PSS request signing against the trade API.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::SigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::sha2::Sha256;
use rsa::RsaPrivateKey;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::adapters::{ExchangeClient, TopOfBook};
use crate::error::{EngineError, Result};

/// REST client for the Kalshi prediction-market exchange.
pub struct KalshiClient {
    http: Client,
    base_url: String,
    api_key: String,
    private_key: RsaPrivateKey,
    request_seq: AtomicI64,
}

impl KalshiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, private_key_pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| EngineError::Internal(format!("invalid Kalshi private key: {e}")))?;
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(EngineError::from)?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            private_key,
            request_seq: AtomicI64::new(0),
        })
    }

    /// Signs `timestamp_ms || method || path` with RSA-PSS (SHA-256, MGF1-SHA-256,
    /// maximum salt length) and base64-encodes the signature.
    fn sign(&self, timestamp_ms: i64, method: &str, path: &str) -> Result<String> {
        let message = format!("{timestamp_ms}{method}{path}");
        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let mut rng = rand::thread_rng();
        let signature = signing_key.sign_with_rng(&mut rng, message.as_bytes());
        Ok(BASE64.encode(signature.to_bytes()))
    }

    async fn authed_get(&self, path: &str) -> Result<serde_json::Value> {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        let full_path = format!("/trade-api/v2{path}");
        let signature = self.sign(timestamp_ms, "GET", &full_path)?;
        self.request_seq.fetch_add(1, Ordering::Relaxed);

        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .header("KALSHI-ACCESS-KEY", &self.api_key)
            .header("KALSHI-ACCESS-TIMESTAMP", timestamp_ms.to_string())
            .header("KALSHI-ACCESS-SIGNATURE", signature)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(EngineError::AuthFailure(format!("kalshi rejected credentials on {path}")));
        }
        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(EngineError::RateLimited { retry_after_secs });
        }
        if !resp.status().is_success() {
            return Err(EngineError::UpstreamFailure(format!(
                "kalshi {path} returned {}",
                resp.status()
            )));
        }
        resp.json::<serde_json::Value>().await.map_err(EngineError::from)
    }
}

#[async_trait]
impl ExchangeClient for KalshiClient {
    async fn get_market_orderbook(&self, ticker: &str) -> Result<TopOfBook> {
        let body = self
            .authed_get(&format!("/markets/{ticker}/orderbook"))
            .await?;
        let orderbook = body.get("orderbook").unwrap_or(&body);

        let best_level = |side: &str| -> (Option<Decimal>, Option<u32>) {
            orderbook
                .get(side)
                .and_then(|levels| levels.as_array())
                .and_then(|levels| levels.first())
                .and_then(|lvl| lvl.as_array())
                .map(|lvl| {
                    let price = lvl.first().and_then(|v| v.as_i64()).map(Decimal::from);
                    let size = lvl.get(1).and_then(|v| v.as_u64()).map(|v| v as u32);
                    (price, size)
                })
                .unwrap_or((None, None))
        };

        let (yes_bid, yes_bid_size) = best_level("yes");
        let (yes_ask_from_no, yes_ask_size) = best_level("no");
        // Kalshi quotes the no-side book; yes_ask = 100 - best no bid.
        let yes_ask = yes_ask_from_no.map(|no_bid| Decimal::from(100) - no_bid);

        debug!(ticker, "fetched top-of-book");
        Ok(TopOfBook {
            ticker: ticker.to_string(),
            yes_bid,
            yes_ask,
            yes_bid_size,
            yes_ask_size,
        })
    }

    async fn get_market(&self, ticker: &str) -> Result<serde_json::Value> {
        self.authed_get(&format!("/markets/{ticker}")).await
    }

    async fn exchange_status(&self) -> Result<bool> {
        match self.authed_get("/exchange/status").await {
            Ok(body) => Ok(body
                .get("trading_active")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)),
            Err(EngineError::UpstreamFailure(msg)) => {
                warn!("exchange status check failed: {msg}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
