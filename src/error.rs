//! Unified error types for the trading helper.

use rust_decimal::Decimal;
use thiserror::Error;

/// Unified error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Broker API error.
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Exit engine error.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Queue/confirm workflow error.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Login flow error.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broker call failures. Per the original tool's own admission there is no
/// retry layer: each of these is surfaced to the error log once.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Order submission failed before an order id was assigned.
    #[error("order submission failed: {0}")]
    SubmissionFailed(String),

    /// Order rejected by the exchange.
    #[error("order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason from the exchange.
        reason: String,
    },

    /// Exit order filled for less than the position quantity.
    #[error("partial fill on order {order_id}: filled {filled} of {requested}")]
    PartialFill {
        /// The partially filled order id.
        order_id: String,
        /// Quantity filled.
        filled: Decimal,
        /// Quantity requested.
        requested: Decimal,
    },

    /// Failed to get order status.
    #[error("failed to get order status for {order_id}: {reason}")]
    StatusFailed {
        /// Order id.
        order_id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to fetch a quote.
    #[error("quote fetch failed for {symbol}: {reason}")]
    QuoteFailed {
        /// The symbol that failed.
        symbol: String,
        /// Reason for failure.
        reason: String,
    },

    /// No broker session; the user has not completed the login flow.
    #[error("no active broker session, login required")]
    SessionMissing,

    /// Invalid order parameters.
    #[error("invalid order parameters: {0}")]
    InvalidParams(String),

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Exit engine errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Price observation is older than the configured maximum age.
    #[error("stale price for {symbol}: {age_secs}s old")]
    StalePrice {
        /// The symbol with the stale quote.
        symbol: String,
        /// Age of the observation in seconds.
        age_secs: i64,
    },

    /// A position transition was attempted out of order.
    /// Positions only move OPEN -> PENDING_EXIT -> CLOSED.
    #[error("invalid transition for {symbol}: {from} -> {to}")]
    InvalidTransition {
        /// Position symbol.
        symbol: String,
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// A limit order needs the threshold price.
    #[error("limit exit requires a price")]
    MissingLimitPrice,
}

/// Queue and confirm workflow errors.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Symbol is not in the NIFTY 50 universe.
    #[error("symbol {0} not in NIFTY 50 universe")]
    SymbolNotInUniverse(String),

    /// A LIMIT entry was queued without a limit price.
    #[error("limit_price required for LIMIT entry")]
    MissingLimitPrice,

    /// Confirm index does not exist.
    #[error("index {0} out of range")]
    IndexOutOfRange(usize),

    /// Requested quantity (explicit or sized from INVEST_AMOUNT) is zero.
    #[error("order quantity resolves to zero for {symbol} at {price}")]
    ZeroQuantity {
        /// Symbol being sized.
        symbol: String,
        /// Reference price used for sizing.
        price: Decimal,
    },

    /// A position is already open for the symbol.
    #[error("position already open for {0}")]
    PositionExists(String),

    /// An exit confirmation referenced a symbol with no tracked position.
    #[error("no tracked position for {0}")]
    UnknownPosition(String),
}

/// Login flow errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// OAuth callback arrived without a request token.
    #[error("missing request_token in callback")]
    MissingRequestToken,

    /// Session token exchange with the broker failed.
    #[error("session token exchange failed: {0}")]
    ExchangeFailed(String),

    /// Confirm token did not match AUTO_CONFIRM_TOKEN.
    #[error("unauthorized confirm token")]
    BadConfirmToken,
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
