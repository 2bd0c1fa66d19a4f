//! Placement of confirmed entries and exits.
//!
//! Called from the confirm endpoint after an action is popped from the
//! queue. Entry fills create a tracked `Position`; exit confirmations send
//! the flattening order for an already-triggered MANUAL position.

use std::time::Instant;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument};

use super::exit::closing_transaction;
use super::position::{Position, Side};
use crate::broker::{OrderParams, OrderType, TransactionType};
use crate::error::{AppError, QueueError};
use crate::hours;
use crate::metrics;
use crate::queue::{EntryRequest, ExitConfirmation};
use crate::state::AppState;

/// Size an order from the configured rupee budget.
pub fn size_quantity(invest_amount: Decimal, price: Decimal) -> u32 {
    if price <= Decimal::ZERO {
        return 0;
    }
    (invest_amount / price).floor().to_u32().unwrap_or(0)
}

/// Place a confirmed entry and start tracking the position.
#[instrument(skip(state, request), fields(symbol = %request.symbol, side = %request.side))]
pub async fn execute_entry(state: &AppState, request: EntryRequest) -> Result<Position, AppError> {
    if state.positions.contains_key(&request.symbol) {
        return Err(QueueError::PositionExists(request.symbol).into());
    }

    // Reference price: the limit for LIMIT entries, the live LTP otherwise.
    let entry_price = match (request.entry_type, request.limit_price) {
        (OrderType::Limit, Some(price)) => price,
        (OrderType::Limit, None) => return Err(QueueError::MissingLimitPrice.into()),
        (OrderType::Market, _) => {
            let start = Instant::now();
            let quote = state.broker.ltp(&request.symbol).await?;
            metrics::record_quote_latency(start, &request.symbol);
            state.history.record(&request.symbol, quote.price);
            quote.price
        }
    };

    let quantity = match request.quantity {
        Some(qty) => qty,
        None => size_quantity(state.config.invest_amount, entry_price),
    };
    if quantity == 0 {
        return Err(QueueError::ZeroQuantity {
            symbol: request.symbol,
            price: entry_price,
        }
        .into());
    }

    let market_open = hours::is_market_open_now();
    let transaction = match request.side {
        Side::Long => TransactionType::Buy,
        Side::Short => TransactionType::Sell,
    };

    let params = match request.entry_type {
        OrderType::Market => {
            OrderParams::market(request.symbol.clone(), transaction, quantity, market_open)
        }
        OrderType::Limit => OrderParams::limit(
            request.symbol.clone(),
            transaction,
            quantity,
            entry_price,
            market_open,
        ),
    }
    .with_tag("entry");

    let start = Instant::now();
    metrics::inc_orders_submitted();
    let order_id = match state.broker.submit_order(&params).await {
        Ok(id) => id,
        Err(e) => {
            metrics::inc_orders_failed();
            state.journal.error(
                "Entry order failed",
                json!({"symbol": params.symbol, "error": e.to_string()}),
            );
            return Err(e.into());
        }
    };
    metrics::record_order_submit_latency(start);

    let (take_profit_price, stop_loss_price) =
        Position::thresholds(entry_price, request.side, request.tp_pct, request.sl_pct);

    let position = Position::open(
        request.symbol.clone(),
        request.side,
        entry_price,
        quantity,
        take_profit_price,
        stop_loss_price,
        request.exit_preference,
        order_id.clone(),
    );

    state.journal.trade(
        "Position opened",
        json!({
            "symbol": position.symbol,
            "side": position.side,
            "qty": position.quantity,
            "entry_price": position.entry_price,
            "tp": position.take_profit_price,
            "sl": position.stop_loss_price,
            "order_id": order_id,
        }),
    );
    metrics::inc_positions_opened();

    state
        .positions
        .insert(position.symbol.clone(), position.clone());

    info!(symbol = %position.symbol, qty = quantity, "Position opened");
    Ok(position)
}

/// Place the exit order for a confirmed MANUAL exit.
#[instrument(skip(state, confirmation), fields(symbol = %confirmation.symbol))]
pub async fn execute_exit_confirmation(
    state: &AppState,
    confirmation: ExitConfirmation,
) -> Result<String, AppError> {
    let (transaction, quantity) = {
        let position = state
            .positions
            .get(&confirmation.symbol)
            .ok_or_else(|| QueueError::UnknownPosition(confirmation.symbol.clone()))?;
        (closing_transaction(&position), position.quantity)
    };

    let market_open = hours::is_market_open_now();
    let params = OrderParams::market(
        confirmation.symbol.clone(),
        transaction,
        quantity,
        market_open,
    )
    .with_tag(format!("exit-{}", confirmation.reason));

    let start = Instant::now();
    metrics::inc_orders_submitted();
    let order_id = match state.broker.submit_order(&params).await {
        Ok(id) => id,
        Err(e) => {
            metrics::inc_orders_failed();
            state.journal.error(
                "Exit order failed",
                json!({"symbol": confirmation.symbol, "error": e.to_string()}),
            );
            return Err(e.into());
        }
    };
    metrics::record_order_submit_latency(start);

    if let Some(mut position) = state.positions.get_mut(&confirmation.symbol) {
        position.record_exit_order(order_id.clone());
    }

    state.journal.trade(
        "Exit order placed after confirmation",
        json!({
            "symbol": confirmation.symbol,
            "reason": confirmation.reason,
            "order_id": order_id,
        }),
    );

    Ok(order_id)
}
