//! Position lifecycle tracking.
//!
//! A position moves OPEN -> PENDING_EXIT -> CLOSED and never backwards.
//! `realized_pnl` is computed exactly once, when the position closes, from
//! the exit fill price.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::EngineError;
use crate::hours;

/// Which way the position trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Profit when price rises.
    #[strum(to_string = "LONG", serialize = "long")]
    Long,
    /// Profit when price falls.
    #[strum(to_string = "SHORT", serialize = "short")]
    Short,
}

impl Side {
    /// +1 for long, -1 for short; the P&L sign multiplier.
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => Decimal::ONE,
            Side::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

/// How exits are authorized during market hours.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExitPreference {
    /// A market order goes out immediately when a threshold fires.
    #[strum(to_string = "AUTO", serialize = "auto")]
    Auto,
    /// Threshold fires queue a confirmation; no order until approved.
    #[default]
    #[strum(to_string = "MANUAL", serialize = "manual")]
    Manual,
}

/// Position lifecycle status. Transitions are monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum PositionStatus {
    /// Tracked by the exit engine.
    #[serde(rename = "OPEN")]
    #[strum(serialize = "OPEN")]
    Open,
    /// An exit has been triggered; order resting or confirmation pending.
    #[serde(rename = "PENDING_EXIT")]
    #[strum(serialize = "PENDING_EXIT")]
    PendingExit,
    /// Exit filled; realized P&L recorded.
    #[serde(rename = "CLOSED")]
    #[strum(serialize = "CLOSED")]
    Closed,
}

/// Which threshold triggered the exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExitReason {
    /// Take-profit threshold crossed favorably.
    #[strum(serialize = "TP")]
    #[serde(rename = "TP")]
    TakeProfit,
    /// Stop-loss threshold crossed adversely.
    #[strum(serialize = "SL")]
    #[serde(rename = "SL")]
    StopLoss,
}

/// An open or closed trade record.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    /// NSE tradingsymbol.
    pub symbol: String,
    /// Long or short.
    pub side: Side,
    /// Fill price of the entry order.
    pub entry_price: Decimal,
    /// Quantity in whole shares.
    pub quantity: u32,
    /// Favorable exit threshold.
    pub take_profit_price: Decimal,
    /// Adverse exit threshold.
    pub stop_loss_price: Decimal,
    /// Exit authorization mode during market hours.
    pub exit_preference: ExitPreference,
    /// Lifecycle status.
    pub status: PositionStatus,
    /// Set exactly once, at CLOSED.
    pub realized_pnl: Option<Decimal>,
    /// Broker id of the entry order.
    pub entry_order_id: String,
    /// Broker id of the exit order, once submitted.
    pub exit_order_id: Option<String>,
    /// Which threshold fired, once triggered.
    pub exit_reason: Option<ExitReason>,
    /// Exit fill price, recorded at CLOSED.
    pub exit_price: Option<Decimal>,
    /// When the position opened (IST).
    pub opened_at: DateTime<FixedOffset>,
    /// When the position closed (IST).
    pub closed_at: Option<DateTime<FixedOffset>>,
}

impl Position {
    /// Open a new position from a filled entry.
    pub fn open(
        symbol: impl Into<String>,
        side: Side,
        entry_price: Decimal,
        quantity: u32,
        take_profit_price: Decimal,
        stop_loss_price: Decimal,
        exit_preference: ExitPreference,
        entry_order_id: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            entry_price,
            quantity,
            take_profit_price,
            stop_loss_price,
            exit_preference,
            status: PositionStatus::Open,
            realized_pnl: None,
            entry_order_id: entry_order_id.into(),
            exit_order_id: None,
            exit_reason: None,
            exit_price: None,
            opened_at: hours::now_ist(),
            closed_at: None,
        }
    }

    /// Derive TP/SL threshold prices from percentages of the entry price.
    /// For shorts the thresholds mirror below/above entry.
    pub fn thresholds(
        entry_price: Decimal,
        side: Side,
        tp_pct: Decimal,
        sl_pct: Decimal,
    ) -> (Decimal, Decimal) {
        let hundred = Decimal::ONE_HUNDRED;
        let tp_delta = entry_price * tp_pct / hundred;
        let sl_delta = entry_price * sl_pct / hundred;
        match side {
            Side::Long => (entry_price + tp_delta, entry_price - sl_delta),
            Side::Short => (entry_price - tp_delta, entry_price + sl_delta),
        }
    }

    /// Check whether a price observation crosses a threshold.
    ///
    /// When a single observation gaps through both thresholds the stop-loss
    /// wins: the adverse level is honored first.
    pub fn exit_trigger(&self, price: Decimal) -> Option<ExitReason> {
        let (sl_hit, tp_hit) = match self.side {
            Side::Long => (
                price <= self.stop_loss_price,
                price >= self.take_profit_price,
            ),
            Side::Short => (
                price >= self.stop_loss_price,
                price <= self.take_profit_price,
            ),
        };

        if sl_hit {
            Some(ExitReason::StopLoss)
        } else if tp_hit {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }

    /// Transition OPEN -> PENDING_EXIT.
    pub fn mark_pending_exit(&mut self, reason: ExitReason) -> Result<(), EngineError> {
        if self.status != PositionStatus::Open {
            return Err(self.bad_transition(PositionStatus::PendingExit));
        }
        self.status = PositionStatus::PendingExit;
        self.exit_reason = Some(reason);
        Ok(())
    }

    /// Record the broker id of the submitted exit order.
    pub fn record_exit_order(&mut self, order_id: impl Into<String>) {
        self.exit_order_id = Some(order_id.into());
    }

    /// Drop the exit order id after a rejection or cancellation. The position stays
    /// PENDING_EXIT for operator intervention; there is no automatic retry.
    pub fn clear_exit_order(&mut self) {
        self.exit_order_id = None;
    }

    /// Transition PENDING_EXIT -> CLOSED, computing realized P&L exactly
    /// once: `(exit - entry) * quantity * sign(side)`.
    pub fn close(&mut self, exit_price: Decimal) -> Result<Decimal, EngineError> {
        if self.status != PositionStatus::PendingExit {
            return Err(self.bad_transition(PositionStatus::Closed));
        }

        let pnl =
            (exit_price - self.entry_price) * Decimal::from(self.quantity) * self.side.sign();

        self.status = PositionStatus::Closed;
        self.realized_pnl = Some(pnl.round_dp(2));
        self.exit_price = Some(exit_price);
        self.closed_at = Some(hours::now_ist());

        Ok(pnl)
    }

    /// Whether the exit engine should still evaluate this position.
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    fn bad_transition(&self, to: PositionStatus) -> EngineError {
        EngineError::InvalidTransition {
            symbol: self.symbol.clone(),
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn side_and_preference_display_uppercase() {
        assert_eq!(Side::Long.to_string(), "LONG");
        assert_eq!(Side::Short.to_string(), "SHORT");
        assert_eq!(ExitPreference::Auto.to_string(), "AUTO");
        assert_eq!(ExitPreference::Manual.to_string(), "MANUAL");
        assert_eq!("manual".parse::<ExitPreference>().unwrap(), ExitPreference::Manual);
    }

    fn long_position() -> Position {
        Position::open(
            "RELIANCE",
            Side::Long,
            dec!(2800),
            10,
            dec!(2822.40), // +0.8%
            dec!(2788.80), // -0.4%
            ExitPreference::Auto,
            "entry-1",
        )
    }

    fn short_position() -> Position {
        Position::open(
            "TCS",
            Side::Short,
            dec!(3100),
            5,
            dec!(3075.20),
            dec!(3112.40),
            ExitPreference::Manual,
            "entry-2",
        )
    }

    #[test]
    fn thresholds_from_percentages() {
        let (tp, sl) = Position::thresholds(dec!(2800), Side::Long, dec!(0.8), dec!(0.4));
        assert_eq!(tp, dec!(2822.4));
        assert_eq!(sl, dec!(2788.8));

        let (tp, sl) = Position::thresholds(dec!(3100), Side::Short, dec!(0.8), dec!(0.4));
        assert_eq!(tp, dec!(3075.2));
        assert_eq!(sl, dec!(3112.4));
    }

    #[test]
    fn long_triggers() {
        let pos = long_position();
        assert_eq!(pos.exit_trigger(dec!(2800)), None);
        assert_eq!(pos.exit_trigger(dec!(2822.40)), Some(ExitReason::TakeProfit));
        assert_eq!(pos.exit_trigger(dec!(2788.80)), Some(ExitReason::StopLoss));
    }

    #[test]
    fn short_triggers() {
        let pos = short_position();
        assert_eq!(pos.exit_trigger(dec!(3100)), None);
        assert_eq!(pos.exit_trigger(dec!(3075)), Some(ExitReason::TakeProfit));
        assert_eq!(pos.exit_trigger(dec!(3113)), Some(ExitReason::StopLoss));
    }

    #[test]
    fn stop_loss_wins_when_both_cross() {
        // Degenerate thresholds: any price crosses both.
        let mut pos = long_position();
        pos.take_profit_price = dec!(2700);
        pos.stop_loss_price = dec!(2900);
        assert_eq!(pos.exit_trigger(dec!(2800)), Some(ExitReason::StopLoss));
    }

    #[test]
    fn lifecycle_is_monotonic() {
        let mut pos = long_position();
        assert!(pos.is_open());

        // Cannot close straight from OPEN.
        assert!(pos.close(dec!(2822.40)).is_err());

        pos.mark_pending_exit(ExitReason::TakeProfit).unwrap();
        assert_eq!(pos.status, PositionStatus::PendingExit);

        // Cannot re-trigger.
        assert!(pos.mark_pending_exit(ExitReason::StopLoss).is_err());

        pos.close(dec!(2822.40)).unwrap();
        assert_eq!(pos.status, PositionStatus::Closed);

        // Never reopened, never re-closed.
        assert!(pos.mark_pending_exit(ExitReason::TakeProfit).is_err());
        assert!(pos.close(dec!(2830)).is_err());
    }

    #[test]
    fn realized_pnl_set_only_at_close() {
        let mut pos = long_position();
        assert_eq!(pos.realized_pnl, None);

        pos.mark_pending_exit(ExitReason::TakeProfit).unwrap();
        assert_eq!(pos.realized_pnl, None);

        pos.close(dec!(2822.40)).unwrap();
        // (2822.40 - 2800) * 10
        assert_eq!(pos.realized_pnl, Some(dec!(224.00)));
        assert_eq!(pos.exit_price, Some(dec!(2822.40)));
        assert!(pos.closed_at.is_some());
    }

    #[test]
    fn short_pnl_sign_flips() {
        let mut pos = short_position();
        pos.mark_pending_exit(ExitReason::StopLoss).unwrap();
        pos.close(dec!(3112.40)).unwrap();
        // (3112.40 - 3100) * 5 * -1
        assert_eq!(pos.realized_pnl, Some(dec!(-62.00)));
    }
}
