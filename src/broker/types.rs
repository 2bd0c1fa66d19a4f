//! Kite Connect wire vocabulary and order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Transaction type: which way the order trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Buy order.
    #[strum(to_string = "BUY", serialize = "buy")]
    Buy,
    /// Sell order.
    #[strum(to_string = "SELL", serialize = "sell")]
    Sell,
}

/// Order type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Execute at the best available price.
    #[default]
    #[strum(to_string = "MARKET", serialize = "market")]
    Market,
    /// Rest on the book at a limit price.
    #[strum(to_string = "LIMIT", serialize = "limit")]
    Limit,
}

/// Order variety. Off-hours orders must go out as AMO (after-market orders);
/// they rest with the broker until the next session opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Variety {
    /// Regular in-session order.
    Regular,
    /// After-market order.
    Amo,
}

impl Variety {
    /// Pick the variety for the current market state.
    pub fn for_market(market_open: bool) -> Self {
        if market_open {
            Variety::Regular
        } else {
            Variety::Amo
        }
    }
}

/// Product category. Everything here is MIS (margin intraday square-off).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
pub enum Product {
    /// Margin intraday square-off.
    #[strum(serialize = "MIS")]
    Mis,
}

/// Order status as reported by the Kite orders API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum OrderStatus {
    /// Order accepted and resting.
    #[strum(to_string = "OPEN", serialize = "open")]
    #[serde(rename = "OPEN")]
    Open,
    /// Order fully filled.
    #[strum(to_string = "COMPLETE", serialize = "complete")]
    #[serde(rename = "COMPLETE")]
    Complete,
    /// Order rejected by the broker or exchange.
    #[strum(to_string = "REJECTED", serialize = "rejected")]
    #[serde(rename = "REJECTED")]
    Rejected,
    /// Order cancelled.
    #[strum(to_string = "CANCELLED", serialize = "cancelled")]
    #[serde(rename = "CANCELLED")]
    Cancelled,
    /// Stop order parked at the exchange.
    #[strum(serialize = "TRIGGER PENDING")]
    #[serde(rename = "TRIGGER PENDING")]
    TriggerPending,
}

impl OrderStatus {
    /// Check if the status is terminal (won't change).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Complete | OrderStatus::Rejected | OrderStatus::Cancelled
        )
    }

    /// Check if the order filled completely.
    pub fn is_filled(&self) -> bool {
        matches!(self, OrderStatus::Complete)
    }
}

/// Order parameters for submission.
#[derive(Debug, Clone)]
pub struct OrderParams {
    /// NSE tradingsymbol.
    pub symbol: String,
    /// Buy or sell.
    pub transaction_type: TransactionType,
    /// Quantity in whole shares.
    pub quantity: u32,
    /// Market or limit.
    pub order_type: OrderType,
    /// Limit price; required when `order_type` is `Limit`.
    pub price: Option<Decimal>,
    /// Regular or AMO.
    pub variety: Variety,
    /// Free-form tag recorded with the order (e.g. "entry", "exit-SL").
    pub tag: String,
}

impl OrderParams {
    /// Create a market order for the current market state.
    pub fn market(
        symbol: impl Into<String>,
        transaction_type: TransactionType,
        quantity: u32,
        market_open: bool,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            transaction_type,
            quantity,
            order_type: OrderType::Market,
            price: None,
            variety: Variety::for_market(market_open),
            tag: "app".to_string(),
        }
    }

    /// Create a limit order for the current market state.
    pub fn limit(
        symbol: impl Into<String>,
        transaction_type: TransactionType,
        quantity: u32,
        price: Decimal,
        market_open: bool,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            transaction_type,
            quantity,
            order_type: OrderType::Limit,
            price: Some(price),
            variety: Variety::for_market(market_open),
            tag: "app".to_string(),
        }
    }

    /// Set the order tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Validate order parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.is_empty() {
            return Err("symbol is required".to_string());
        }
        if self.quantity == 0 {
            return Err("quantity must be positive".to_string());
        }
        match (self.order_type, self.price) {
            (OrderType::Limit, None) => Err("LIMIT order needs a price".to_string()),
            (_, Some(p)) if p <= Decimal::ZERO => Err("price must be positive".to_string()),
            _ => Ok(()),
        }
    }
}

/// Order state summary from the broker.
#[derive(Debug, Clone)]
pub struct OrderState {
    /// Broker order id.
    pub order_id: String,
    /// Current status, if the broker reported one we understand.
    pub status: Option<OrderStatus>,
    /// Quantity filled so far.
    pub filled_quantity: Decimal,
    /// Quantity still pending.
    pub pending_quantity: Decimal,
    /// Average fill price, when any quantity has filled.
    pub average_price: Option<Decimal>,
}

/// Broker session produced by the login flow.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    /// Access token for authenticated calls.
    pub access_token: String,
    /// Broker user id.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// A single last-traded-price observation.
#[derive(Debug, Clone, Serialize)]
pub struct PriceQuote {
    /// NSE tradingsymbol.
    pub symbol: String,
    /// Last traded price.
    pub price: Decimal,
    /// When the observation was taken.
    pub observed_at: DateTime<Utc>,
}

/// Daily OHLC for a symbol (prior session values from the quote API).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DayOhlc {
    /// Session open.
    pub open: Decimal,
    /// Session high.
    pub high: Decimal,
    /// Session low.
    pub low: Decimal,
    /// Session close.
    pub close: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn variety_tracks_market_state() {
        assert_eq!(Variety::for_market(true), Variety::Regular);
        assert_eq!(Variety::for_market(false), Variety::Amo);
        assert_eq!(Variety::Amo.to_string(), "amo");
    }

    #[test]
    fn order_vocab_displays_uppercase() {
        assert_eq!(TransactionType::Buy.to_string(), "BUY");
        assert_eq!(TransactionType::Sell.to_string(), "SELL");
        assert_eq!(OrderType::Market.to_string(), "MARKET");
        assert_eq!(OrderType::Limit.to_string(), "LIMIT");
        assert_eq!(OrderStatus::Complete.to_string(), "COMPLETE");
        assert_eq!("buy".parse::<TransactionType>().unwrap(), TransactionType::Buy);
        assert_eq!("MARKET".parse::<OrderType>().unwrap(), OrderType::Market);
    }

    #[test]
    fn order_params_validation() {
        let valid = OrderParams::market("RELIANCE", TransactionType::Buy, 10, true);
        assert!(valid.validate().is_ok());

        let no_symbol = OrderParams::market("", TransactionType::Buy, 10, true);
        assert!(no_symbol.validate().is_err());

        let zero_qty = OrderParams::market("RELIANCE", TransactionType::Buy, 0, true);
        assert!(zero_qty.validate().is_err());

        let limit_without_price = OrderParams {
            price: None,
            ..OrderParams::limit("TCS", TransactionType::Sell, 5, dec!(3100), false)
        };
        assert!(limit_without_price.validate().is_err());
    }

    #[test]
    fn limit_params_carry_price_and_variety() {
        let params = OrderParams::limit("TCS", TransactionType::Sell, 5, dec!(3100.50), false);
        assert_eq!(params.order_type, OrderType::Limit);
        assert_eq!(params.price, Some(dec!(3100.50)));
        assert_eq!(params.variety, Variety::Amo);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn order_status_terminal() {
        assert!(OrderStatus::Complete.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Open.is_terminal());
        assert!(!OrderStatus::TriggerPending.is_terminal());
        assert!(OrderStatus::Complete.is_filled());
    }

    #[test]
    fn order_status_from_string() {
        use std::str::FromStr;
        assert_eq!(OrderStatus::from_str("COMPLETE").unwrap(), OrderStatus::Complete);
        assert_eq!(
            OrderStatus::from_str("TRIGGER PENDING").unwrap(),
            OrderStatus::TriggerPending
        );
    }
}
