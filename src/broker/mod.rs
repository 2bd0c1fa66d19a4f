//! Broker integration: the narrow trait the engine depends on, the real
//! Kite Connect client, and a mock for tests.

pub mod kite;
pub mod mock;
pub mod types;

pub use kite::KiteBroker;
pub use mock::{FillMode, MockBroker, MockConfig, SubmittedOrder};
pub use types::{
    DayOhlc, OrderParams, OrderState, OrderStatus, OrderType, PriceQuote, Product, Session,
    TransactionType, Variety,
};

use async_trait::async_trait;

use crate::error::BrokerError;

/// The narrow broker interface everything above trades through.
///
/// The exit engine, queue workflow, and HTTP handlers only see this trait;
/// the Kite SDK details stay inside [`kite::KiteBroker`].
#[async_trait]
pub trait Broker: Send + Sync {
    /// The broker's OAuth login URL for this app.
    fn login_url(&self) -> String;

    /// Exchange the OAuth request token for an access token.
    async fn generate_session(&self, request_token: &str) -> Result<Session, BrokerError>;

    /// Last traded price for an NSE symbol.
    async fn ltp(&self, symbol: &str) -> Result<PriceQuote, BrokerError>;

    /// Current-day OHLC for an NSE symbol (pivot inputs).
    async fn day_ohlc(&self, symbol: &str) -> Result<DayOhlc, BrokerError>;

    /// Place an MIS order, returning the broker order id.
    async fn submit_order(&self, params: &OrderParams) -> Result<String, BrokerError>;

    /// Fetch the current state of an order.
    async fn order_status(&self, order_id: &str) -> Result<OrderState, BrokerError>;
}
