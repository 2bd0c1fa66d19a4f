//! Kite Connect REST client.
//!
//! Implements the subset of the Kite Connect v3 API this app needs: the
//! session token exchange, LTP/OHLC quotes, MIS order placement, and order
//! status. Everything is exchange-scoped to NSE.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use super::types::{
    DayOhlc, OrderParams, OrderState, OrderStatus, OrderType, PriceQuote, Session,
};
use super::Broker;
use crate::config::Config;
use crate::error::BrokerError;

/// Kite Connect login page.
const LOGIN_BASE: &str = "https://kite.trade/connect/login";

/// Kite Connect REST client.
pub struct KiteBroker {
    api_key: String,
    api_secret: String,
    base_url: String,
    http: reqwest::Client,
    // Set by generate_session; absent until the user completes the login flow.
    access_token: RwLock<Option<String>>,
}

impl KiteBroker {
    /// Create a client from configuration.
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self {
            api_key: config.kite_api_key.clone(),
            api_secret: config.kite_api_secret.clone(),
            base_url: config.kite_api_url.trim_end_matches('/').to_string(),
            http,
            access_token: RwLock::new(None),
        }
    }

    /// Whether a session token is present.
    pub fn has_session(&self) -> bool {
        self.access_token
            .read()
            .map(|t| t.is_some())
            .unwrap_or(false)
    }

    fn auth_header(&self) -> Result<String, BrokerError> {
        let token = self
            .access_token
            .read()
            .ok()
            .and_then(|t| t.clone())
            .ok_or(BrokerError::SessionMissing)?;
        Ok(format!("token {}:{}", self.api_key, token))
    }

    /// Checksum for the session token exchange:
    /// `sha256(api_key + request_token + api_secret)`, hex-encoded.
    fn session_checksum(&self, request_token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.api_key.as_bytes());
        hasher.update(request_token.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, BrokerError> {
        let response = self
            .http
            .get(url)
            .header("X-Kite-Version", "3")
            .header("Authorization", self.auth_header()?)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown broker error");
            return Err(BrokerError::SubmissionFailed(format!(
                "HTTP {}: {}",
                status, message
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl Broker for KiteBroker {
    fn login_url(&self) -> String {
        format!("{}?v=3&api_key={}", LOGIN_BASE, self.api_key)
    }

    #[instrument(skip(self, request_token))]
    async fn generate_session(&self, request_token: &str) -> Result<Session, BrokerError> {
        let url = format!("{}/session/token", self.base_url);
        let checksum = self.session_checksum(request_token);

        let form = [
            ("api_key", self.api_key.as_str()),
            ("request_token", request_token),
            ("checksum", checksum.as_str()),
        ];

        let response = self
            .http
            .post(&url)
            .header("X-Kite-Version", "3")
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("token exchange rejected");
            return Err(BrokerError::SubmissionFailed(format!(
                "HTTP {}: {}",
                status, message
            )));
        }

        let session: Session = serde_json::from_value(body["data"].clone())
            .map_err(|e| BrokerError::SubmissionFailed(format!("bad session payload: {}", e)))?;

        if let Ok(mut token) = self.access_token.write() {
            *token = Some(session.access_token.clone());
        }

        info!(user_id = ?session.user_id, "Kite session established");
        Ok(session)
    }

    async fn ltp(&self, symbol: &str) -> Result<PriceQuote, BrokerError> {
        let instrument = format!("NSE:{}", symbol);
        let url = format!("{}/quote/ltp?{}", self.base_url, instrument_query(&instrument));

        let body = self.get_json(&url).await?;
        let price = body["data"][&instrument]["last_price"]
            .as_f64()
            .and_then(|p| Decimal::try_from(p).ok())
            .ok_or_else(|| BrokerError::QuoteFailed {
                symbol: symbol.to_string(),
                reason: "last_price missing from quote".to_string(),
            })?;

        debug!(%symbol, %price, "LTP fetched");

        Ok(PriceQuote {
            symbol: symbol.to_string(),
            price,
            observed_at: Utc::now(),
        })
    }

    async fn day_ohlc(&self, symbol: &str) -> Result<DayOhlc, BrokerError> {
        let instrument = format!("NSE:{}", symbol);
        let url = format!("{}/quote/ohlc?{}", self.base_url, instrument_query(&instrument));

        let body = self.get_json(&url).await?;
        serde_json::from_value(body["data"][&instrument]["ohlc"].clone()).map_err(|e| {
            BrokerError::QuoteFailed {
                symbol: symbol.to_string(),
                reason: format!("ohlc missing from quote: {}", e),
            }
        })
    }

    #[instrument(skip(self, params), fields(symbol = %params.symbol, side = %params.transaction_type))]
    async fn submit_order(&self, params: &OrderParams) -> Result<String, BrokerError> {
        params.validate().map_err(BrokerError::InvalidParams)?;

        let url = format!("{}/orders/{}", self.base_url, params.variety);

        let mut form: Vec<(&str, String)> = vec![
            ("exchange", "NSE".to_string()),
            ("tradingsymbol", params.symbol.clone()),
            ("transaction_type", params.transaction_type.to_string()),
            ("quantity", params.quantity.to_string()),
            ("product", "MIS".to_string()),
            ("order_type", params.order_type.to_string()),
            ("validity", "DAY".to_string()),
            ("tag", params.tag.clone()),
        ];

        if params.order_type == OrderType::Limit {
            let price = params.price.ok_or(BrokerError::InvalidParams(
                "LIMIT order needs a price".to_string(),
            ))?;
            form.push(("price", price.round_dp(2).to_string()));
        }

        let response = self
            .http
            .post(&url)
            .header("X-Kite-Version", "3")
            .header("Authorization", self.auth_header()?)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("order rejected")
                .to_string();
            return Err(BrokerError::OrderRejected { reason: message });
        }

        let order_id = body["data"]["order_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                BrokerError::SubmissionFailed("no order_id in response".to_string())
            })?;

        info!(
            order_id = %order_id,
            symbol = %params.symbol,
            qty = params.quantity,
            order_type = %params.order_type,
            variety = %params.variety,
            tag = %params.tag,
            "Order placed"
        );

        Ok(order_id)
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderState, BrokerError> {
        let url = format!("{}/orders/{}", self.base_url, order_id);
        let body = self.get_json(&url).await.map_err(|e| match e {
            BrokerError::SessionMissing => BrokerError::SessionMissing,
            other => BrokerError::StatusFailed {
                order_id: order_id.to_string(),
                reason: other.to_string(),
            },
        })?;

        // The orders endpoint returns the full order history; the last entry
        // is the current state.
        let latest = body["data"]
            .as_array()
            .and_then(|history| history.last())
            .cloned()
            .ok_or_else(|| BrokerError::StatusFailed {
                order_id: order_id.to_string(),
                reason: "empty order history".to_string(),
            })?;

        let status = latest["status"]
            .as_str()
            .and_then(|s| s.parse::<OrderStatus>().ok());

        let filled_quantity = decimal_field(&latest, "filled_quantity").unwrap_or(Decimal::ZERO);
        let pending_quantity = decimal_field(&latest, "pending_quantity").unwrap_or(Decimal::ZERO);
        let average_price =
            decimal_field(&latest, "average_price").filter(|p| *p > Decimal::ZERO);

        Ok(OrderState {
            order_id: order_id.to_string(),
            status,
            filled_quantity,
            pending_quantity,
            average_price,
        })
    }
}

/// Encode the `i=` parameter for the quote endpoints. Symbols like
/// `M&M` carry characters that would otherwise split the query string.
fn instrument_query(instrument: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("i", instrument)
        .finish()
}

/// Parse a numeric field that Kite may report as number or string.
fn decimal_field(json: &serde_json::Value, key: &str) -> Option<Decimal> {
    let value = json.get(key)?;
    if let Some(s) = value.as_str() {
        return s.parse().ok();
    }
    value.as_f64().and_then(|n| Decimal::try_from(n).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_broker() -> KiteBroker {
        KiteBroker::new(&Config::default())
    }

    #[test]
    fn login_url_carries_api_key() {
        let broker = test_broker();
        assert_eq!(
            broker.login_url(),
            "https://kite.trade/connect/login?v=3&api_key=test-key"
        );
    }

    #[test]
    fn session_checksum_is_sha256_of_concatenation() {
        let broker = test_broker();
        let checksum = broker.session_checksum("req-token");

        let mut hasher = Sha256::new();
        hasher.update(b"test-keyreq-tokentest-secret");
        assert_eq!(checksum, hex::encode(hasher.finalize()));
        assert_eq!(checksum.len(), 64);
    }

    #[test]
    fn calls_without_session_are_rejected() {
        let broker = test_broker();
        assert!(!broker.has_session());
        assert!(matches!(
            broker.auth_header(),
            Err(BrokerError::SessionMissing)
        ));
    }

    #[test]
    fn instrument_query_percent_encodes_ampersands() {
        assert_eq!(instrument_query("NSE:M&M"), "i=NSE%3AM%26M");
        assert_eq!(instrument_query("NSE:RELIANCE"), "i=NSE%3ARELIANCE");
    }

    #[test]
    fn decimal_field_handles_both_representations() {
        let json = serde_json::json!({
            "filled_quantity": 10,
            "average_price": "2815.45"
        });
        assert_eq!(
            decimal_field(&json, "filled_quantity"),
            Some(Decimal::new(10, 0))
        );
        assert_eq!(
            decimal_field(&json, "average_price"),
            Some(Decimal::new(281545, 2))
        );
        assert_eq!(decimal_field(&json, "missing"), None);
    }
}
