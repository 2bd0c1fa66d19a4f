//! The periodic exit watcher.
//!
//! Every `POLL_INTERVAL_SECS` the watcher sweeps tracked positions:
//!
//! - OPEN positions get a fresh LTP, a staleness check, and a TP/SL trigger
//!   evaluation; triggered exits are routed per the exit policy.
//! - PENDING_EXIT positions with a submitted exit order get a status poll;
//!   a COMPLETE fill closes the position and archives it to the trade log.
//!
//! Broker failures are journaled and never retried automatically.

use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use super::exit::{choose_exit_route, exit_order, is_stale, threshold_price, ExitRoute};
use super::position::{ExitReason, PositionStatus};
use crate::broker::{OrderState, OrderStatus};
use crate::error::BrokerError;
use crate::hours;
use crate::metrics;
use crate::queue::ExitConfirmation;
use crate::state::SharedState;

/// The periodic exit evaluation task.
pub struct ExitWatcher {
    state: SharedState,
}

impl ExitWatcher {
    /// Create a watcher over the shared state.
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Run forever, one evaluation pass per poll interval.
    pub async fn run(self) {
        let interval = std::time::Duration::from_secs(self.state.config.poll_interval_secs);
        info!(interval_secs = self.state.config.poll_interval_secs, "Exit watcher started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let _timer = metrics::timer_watcher_tick();
            self.tick_at(hours::is_market_open_now()).await;
        }
    }

    /// One evaluation pass with an explicit market-hours state.
    pub async fn tick_at(&self, market_open: bool) {
        let symbols: Vec<String> = self
            .state
            .positions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for symbol in symbols {
            // Snapshot; the map is never held across an await.
            let Some(position) = self.state.positions.get(&symbol).map(|p| p.clone()) else {
                continue;
            };

            match position.status {
                PositionStatus::Open => self.evaluate_open(&symbol, market_open).await,
                PositionStatus::PendingExit => {
                    if let Some(order_id) = position.exit_order_id.clone() {
                        self.poll_exit_fill(&symbol, &order_id).await;
                    }
                    // No order id: awaiting confirmation or a rejected
                    // order awaiting operator intervention.
                }
                PositionStatus::Closed => {}
            }
        }
    }

    /// Evaluate an OPEN position against a fresh price observation.
    async fn evaluate_open(&self, symbol: &str, market_open: bool) {
        let start = Instant::now();
        let quote = match self.state.broker.ltp(symbol).await {
            Ok(quote) => quote,
            Err(e) => {
                self.state.journal.error(
                    "LTP fetch failed",
                    json!({"symbol": symbol, "error": e.to_string()}),
                );
                return;
            }
        };
        metrics::record_quote_latency(start, symbol);
        self.state.history.record(symbol, quote.price);

        let age_secs = (Utc::now() - quote.observed_at).num_seconds();
        if is_stale(
            quote.observed_at,
            Utc::now(),
            self.state.config.price_max_age_secs,
        ) {
            metrics::inc_stale_prices();
            self.state.journal.error(
                "Stale price, evaluation skipped",
                json!({"symbol": symbol, "age_secs": age_secs}),
            );
            return;
        }

        let Some(position) = self.state.positions.get(symbol).map(|p| p.clone()) else {
            return;
        };
        let Some(reason) = position.exit_trigger(quote.price) else {
            return;
        };

        info!(
            %symbol,
            reason = %reason,
            price = %quote.price,
            "Exit threshold crossed"
        );
        metrics::inc_exits_triggered(&reason.to_string());

        let threshold = threshold_price(&position, reason);
        let route = choose_exit_route(market_open, position.exit_preference, threshold);

        // Transition first: the trigger is a fact even if the order fails.
        {
            let Some(mut tracked) = self.state.positions.get_mut(symbol) else {
                return;
            };
            if tracked.mark_pending_exit(reason).is_err() {
                // Raced with a confirm; leave it alone.
                return;
            }
        }

        match route {
            ExitRoute::NeedsConfirmation => {
                let queued = self.state.queue.push_exit(ExitConfirmation {
                    symbol: symbol.to_string(),
                    reason,
                    trigger_price: quote.price,
                    queued_at: None,
                });
                if queued {
                    self.state.journal.trade(
                        "Exit confirmation queued",
                        json!({"symbol": symbol, "reason": reason, "price": quote.price}),
                    );
                }
            }
            route => {
                let Some(params) = exit_order(&position, reason, route, market_open) else {
                    return;
                };

                let start = Instant::now();
                metrics::inc_orders_submitted();
                match self.state.broker.submit_order(&params).await {
                    Ok(order_id) => {
                        metrics::record_order_submit_latency(start);
                        if let Some(mut tracked) = self.state.positions.get_mut(symbol) {
                            tracked.record_exit_order(order_id.clone());
                        }
                        self.state.journal.trade(
                            "Exit order placed",
                            json!({
                                "symbol": symbol,
                                "reason": reason,
                                "order_type": params.order_type,
                                "price": params.price,
                                "order_id": order_id,
                            }),
                        );
                    }
                    Err(e) => {
                        metrics::inc_orders_failed();
                        self.state.journal.error(
                            "Exit order failed",
                            json!({"symbol": symbol, "reason": reason, "error": e.to_string()}),
                        );
                    }
                }
            }
        }
    }

    /// Poll the exit order of a PENDING_EXIT position and close on fill.
    async fn poll_exit_fill(&self, symbol: &str, order_id: &str) {
        let order = match self.state.broker.order_status(order_id).await {
            Ok(order) => order,
            Err(e) => {
                self.state.journal.error(
                    "Order status check failed",
                    json!({"symbol": symbol, "order_id": order_id, "error": e.to_string()}),
                );
                return;
            }
        };

        match order.status {
            Some(OrderStatus::Complete) => self.close_position(symbol, &order).await,
            Some(OrderStatus::Rejected) => {
                metrics::inc_orders_failed();
                self.state.journal.error(
                    "Exit order rejected",
                    json!({"symbol": symbol, "order_id": order_id}),
                );
                if let Some(mut position) = self.state.positions.get_mut(symbol) {
                    position.clear_exit_order();
                }
            }
            Some(OrderStatus::Cancelled) => {
                let requested = order.filled_quantity + order.pending_quantity;
                if order.filled_quantity > rust_decimal::Decimal::ZERO {
                    let e = BrokerError::PartialFill {
                        order_id: order_id.to_string(),
                        filled: order.filled_quantity,
                        requested,
                    };
                    self.state.journal.error(
                        "Partial fill on exit order",
                        json!({"symbol": symbol, "error": e.to_string()}),
                    );
                } else {
                    self.state.journal.error(
                        "Exit order cancelled",
                        json!({"symbol": symbol, "order_id": order_id}),
                    );
                }
                // Cancelled is terminal: drop the order id so later
                // ticks stop re-polling it.
                if let Some(mut position) = self.state.positions.get_mut(symbol) {
                    position.clear_exit_order();
                }
            }
            _ => {
                debug!(%symbol, %order_id, status = ?order.status, "Exit order still working");
            }
        }
    }

    /// Transition a fully filled exit to CLOSED and archive it.
    async fn close_position(&self, symbol: &str, order: &OrderState) {
        let Some((_, mut position)) = self.state.positions.remove(symbol) else {
            return;
        };

        // Fall back to the threshold when the broker omits the fill price.
        let exit_price = order.average_price.unwrap_or_else(|| {
            position
                .exit_reason
                .map(|reason| threshold_price(&position, reason))
                .unwrap_or(position.entry_price)
        });

        match position.close(exit_price) {
            Ok(pnl) => {
                metrics::inc_orders_filled();
                metrics::inc_positions_closed();
                self.state.journal.trade(
                    "Position closed",
                    json!({
                        "symbol": position.symbol,
                        "reason": position.exit_reason,
                        "exit_price": exit_price,
                        "pnl": position.realized_pnl,
                        "order_id": order.order_id,
                    }),
                );
                info!(%symbol, %pnl, "Position closed");
                self.state.archive(position).await;
            }
            Err(e) => {
                // Should be unreachable; restore the record rather than lose it.
                warn!(%symbol, error = %e, "Close failed, restoring position");
                self.state
                    .positions
                    .insert(symbol.to_string(), position);
            }
        }
    }
}

/// Which reason a pending exit was queued for, if any. Test seam used by the
/// integration suite.
pub fn pending_exit_reason(state: &SharedState, symbol: &str) -> Option<ExitReason> {
    state
        .positions
        .get(symbol)
        .and_then(|position| position.exit_reason)
}
