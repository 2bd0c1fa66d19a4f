//! Exit route policy.
//!
//! Pure decision logic: given a triggered threshold, the market-hours state,
//! and the position's exit preference, pick how the exit order goes out.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::position::{ExitPreference, ExitReason, Position};
use crate::broker::{OrderParams, TransactionType};

/// How a triggered exit should be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitRoute {
    /// Market closed: rest a LIMIT order at the triggering threshold price.
    /// It cannot execute until the exchange reopens.
    RestingLimit {
        /// The threshold price that fired.
        price: Decimal,
    },
    /// Market open with AUTO preference: a MARKET order goes out now.
    Immediate,
    /// Market open with MANUAL preference: queue a confirmation, place
    /// nothing until the user (or sidecar) approves it.
    NeedsConfirmation,
}

/// Pick the exit route for a triggered threshold.
pub fn choose_exit_route(
    market_open: bool,
    preference: ExitPreference,
    threshold_price: Decimal,
) -> ExitRoute {
    if !market_open {
        return ExitRoute::RestingLimit {
            price: threshold_price,
        };
    }
    match preference {
        ExitPreference::Auto => ExitRoute::Immediate,
        ExitPreference::Manual => ExitRoute::NeedsConfirmation,
    }
}

/// The threshold price for a triggered reason.
pub fn threshold_price(position: &Position, reason: ExitReason) -> Decimal {
    match reason {
        ExitReason::TakeProfit => position.take_profit_price,
        ExitReason::StopLoss => position.stop_loss_price,
    }
}

/// The transaction type that flattens a position.
pub fn closing_transaction(position: &Position) -> TransactionType {
    match position.side {
        super::position::Side::Long => TransactionType::Sell,
        super::position::Side::Short => TransactionType::Buy,
    }
}

/// Build the exit order for a route. `NeedsConfirmation` produces no order.
pub fn exit_order(
    position: &Position,
    reason: ExitReason,
    route: ExitRoute,
    market_open: bool,
) -> Option<OrderParams> {
    let txn = closing_transaction(position);
    let tag = format!("exit-{}", reason);

    match route {
        ExitRoute::Immediate => Some(
            OrderParams::market(position.symbol.clone(), txn, position.quantity, market_open)
                .with_tag(tag),
        ),
        ExitRoute::RestingLimit { price } => Some(
            OrderParams::limit(
                position.symbol.clone(),
                txn,
                position.quantity,
                price,
                market_open,
            )
            .with_tag(tag),
        ),
        ExitRoute::NeedsConfirmation => None,
    }
}

/// Whether a price observation is too old to act on.
pub fn is_stale(observed_at: DateTime<Utc>, now: DateTime<Utc>, max_age_secs: i64) -> bool {
    (now - observed_at).num_seconds() > max_age_secs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{OrderType, Variety};
    use crate::engine::position::Side;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn position(side: Side, preference: ExitPreference) -> Position {
        Position::open(
            "RELIANCE",
            side,
            dec!(2800),
            10,
            dec!(2822.40),
            dec!(2788.80),
            preference,
            "entry-1",
        )
    }

    #[test]
    fn closed_market_routes_to_resting_limit() {
        let route = choose_exit_route(false, ExitPreference::Auto, dec!(2788.80));
        assert_eq!(route, ExitRoute::RestingLimit { price: dec!(2788.80) });

        // Preference is irrelevant off-hours.
        let route = choose_exit_route(false, ExitPreference::Manual, dec!(2788.80));
        assert_eq!(route, ExitRoute::RestingLimit { price: dec!(2788.80) });
    }

    #[test]
    fn open_market_auto_routes_to_market_order() {
        let route = choose_exit_route(true, ExitPreference::Auto, dec!(2822.40));
        assert_eq!(route, ExitRoute::Immediate);
    }

    #[test]
    fn open_market_manual_requires_confirmation() {
        let route = choose_exit_route(true, ExitPreference::Manual, dec!(2822.40));
        assert_eq!(route, ExitRoute::NeedsConfirmation);
    }

    #[test]
    fn resting_limit_builds_amo_limit_order() {
        let pos = position(Side::Long, ExitPreference::Auto);
        let route = choose_exit_route(false, pos.exit_preference, pos.stop_loss_price);
        let order = exit_order(&pos, ExitReason::StopLoss, route, false).unwrap();

        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.price, Some(dec!(2788.80)));
        assert_eq!(order.variety, Variety::Amo);
        assert_eq!(order.transaction_type, TransactionType::Sell);
        assert_eq!(order.tag, "exit-SL");
    }

    #[test]
    fn immediate_builds_market_order_with_closing_side() {
        let mut pos = position(Side::Short, ExitPreference::Auto);
        pos.take_profit_price = dec!(2777.60);
        let order = exit_order(&pos, ExitReason::TakeProfit, ExitRoute::Immediate, true).unwrap();

        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.transaction_type, TransactionType::Buy);
        assert_eq!(order.variety, Variety::Regular);
        assert_eq!(order.tag, "exit-TP");
    }

    #[test]
    fn confirmation_route_places_nothing() {
        let pos = position(Side::Long, ExitPreference::Manual);
        assert!(exit_order(&pos, ExitReason::TakeProfit, ExitRoute::NeedsConfirmation, true).is_none());
    }

    #[test]
    fn staleness_check() {
        let now = Utc::now();
        assert!(!is_stale(now - Duration::seconds(10), now, 30));
        assert!(is_stale(now - Duration::seconds(31), now, 30));
    }
}
