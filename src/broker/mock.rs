//! Mock broker for unit and integration testing.
//!
//! Scripted quotes, recorded order submissions, and configurable fill and
//! failure behavior, without any network traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use super::types::{DayOhlc, OrderParams, OrderState, OrderStatus, PriceQuote, Session};
use super::Broker;
use crate::error::BrokerError;

/// How the mock reports submitted orders when their status is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    /// Every order fills completely at its limit price (or the scripted LTP).
    #[default]
    Complete,
    /// Orders cancel after filling half the requested quantity.
    Partial,
    /// Orders rest OPEN and never fill.
    Resting,
}

/// Configuration for mock broker behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Whether order submissions are rejected.
    pub fail_submit: bool,
    /// Whether quote requests fail.
    pub fail_quote: bool,
    /// Fill behavior for status polls.
    pub fill_mode: FillMode,
}

/// A recorded order submission.
#[derive(Debug, Clone)]
pub struct SubmittedOrder {
    /// Assigned order id.
    pub order_id: String,
    /// The parameters as submitted.
    pub params: OrderParams,
}

/// Mock broker for testing.
#[derive(Default)]
pub struct MockBroker {
    config: Mutex<MockConfig>,
    prices: Mutex<HashMap<String, PriceQuote>>,
    ohlc: Mutex<HashMap<String, DayOhlc>>,
    orders: Mutex<Vec<SubmittedOrder>>,
    next_id: AtomicU64,
}

impl MockBroker {
    /// Create a mock with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock with custom configuration.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config: Mutex::new(config),
            ..Self::default()
        }
    }

    /// Script the LTP for a symbol, observed now.
    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.set_price_aged(symbol, price, 0);
    }

    /// Script the LTP for a symbol with an observation age in seconds.
    pub fn set_price_aged(&self, symbol: &str, price: Decimal, age_secs: i64) {
        let quote = PriceQuote {
            symbol: symbol.to_string(),
            price,
            observed_at: Utc::now() - Duration::seconds(age_secs),
        };
        self.prices
            .lock()
            .expect("mock prices lock")
            .insert(symbol.to_string(), quote);
    }

    /// Script the day OHLC for a symbol.
    pub fn set_ohlc(&self, symbol: &str, ohlc: DayOhlc) {
        self.ohlc
            .lock()
            .expect("mock ohlc lock")
            .insert(symbol.to_string(), ohlc);
    }

    /// Switch the fill mode at runtime.
    pub fn set_fill_mode(&self, mode: FillMode) {
        self.config.lock().expect("mock config lock").fill_mode = mode;
    }

    /// All orders submitted so far, in order.
    pub fn submitted_orders(&self) -> Vec<SubmittedOrder> {
        self.orders.lock().expect("mock orders lock").clone()
    }

    /// Count of submitted orders.
    pub fn order_count(&self) -> usize {
        self.orders.lock().expect("mock orders lock").len()
    }

    fn find_order(&self, order_id: &str) -> Option<SubmittedOrder> {
        self.orders
            .lock()
            .expect("mock orders lock")
            .iter()
            .find(|o| o.order_id == order_id)
            .cloned()
    }

    fn fill_price_for(&self, params: &OrderParams) -> Decimal {
        params.price.unwrap_or_else(|| {
            self.prices
                .lock()
                .expect("mock prices lock")
                .get(&params.symbol)
                .map(|q| q.price)
                .unwrap_or(Decimal::ZERO)
        })
    }
}

#[async_trait]
impl Broker for MockBroker {
    fn login_url(&self) -> String {
        "https://kite.trade/connect/login?v=3&api_key=mock".to_string()
    }

    async fn generate_session(&self, _request_token: &str) -> Result<Session, BrokerError> {
        Ok(Session {
            access_token: "mock-access-token".to_string(),
            user_id: Some("MOCK01".to_string()),
        })
    }

    async fn ltp(&self, symbol: &str) -> Result<PriceQuote, BrokerError> {
        if self.config.lock().expect("mock config lock").fail_quote {
            return Err(BrokerError::QuoteFailed {
                symbol: symbol.to_string(),
                reason: "mock quote failure".to_string(),
            });
        }

        self.prices
            .lock()
            .expect("mock prices lock")
            .get(symbol)
            .cloned()
            .ok_or_else(|| BrokerError::QuoteFailed {
                symbol: symbol.to_string(),
                reason: "no scripted price".to_string(),
            })
    }

    async fn day_ohlc(&self, symbol: &str) -> Result<DayOhlc, BrokerError> {
        self.ohlc
            .lock()
            .expect("mock ohlc lock")
            .get(symbol)
            .copied()
            .ok_or_else(|| BrokerError::QuoteFailed {
                symbol: symbol.to_string(),
                reason: "no scripted ohlc".to_string(),
            })
    }

    async fn submit_order(&self, params: &OrderParams) -> Result<String, BrokerError> {
        params.validate().map_err(BrokerError::InvalidParams)?;

        if self.config.lock().expect("mock config lock").fail_submit {
            return Err(BrokerError::OrderRejected {
                reason: "mock rejection".to_string(),
            });
        }

        let order_id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.orders.lock().expect("mock orders lock").push(SubmittedOrder {
            order_id: order_id.clone(),
            params: params.clone(),
        });

        Ok(order_id)
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderState, BrokerError> {
        let order = self
            .find_order(order_id)
            .ok_or_else(|| BrokerError::StatusFailed {
                order_id: order_id.to_string(),
                reason: "unknown order".to_string(),
            })?;

        let quantity = Decimal::from(order.params.quantity);
        let fill_price = self.fill_price_for(&order.params);
        let mode = self.config.lock().expect("mock config lock").fill_mode;

        let state = match mode {
            FillMode::Complete => OrderState {
                order_id: order_id.to_string(),
                status: Some(OrderStatus::Complete),
                filled_quantity: quantity,
                pending_quantity: Decimal::ZERO,
                average_price: Some(fill_price),
            },
            FillMode::Partial => {
                let filled = (quantity / Decimal::TWO).floor();
                OrderState {
                    order_id: order_id.to_string(),
                    status: Some(OrderStatus::Cancelled),
                    filled_quantity: filled,
                    pending_quantity: quantity - filled,
                    average_price: Some(fill_price),
                }
            }
            FillMode::Resting => OrderState {
                order_id: order_id.to_string(),
                status: Some(OrderStatus::Open),
                filled_quantity: Decimal::ZERO,
                pending_quantity: quantity,
                average_price: None,
            },
        };

        Ok(state)
    }
}
