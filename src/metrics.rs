//! Prometheus metrics for the trading helper.
//!
//! Counters for the order lifecycle and exit engine, histograms for broker
//! call latency. Rendered at `GET /metrics`.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// Orders submitted counter metric name.
pub const METRIC_ORDERS_SUBMITTED: &str = "orders_submitted_total";
/// Orders filled counter metric name.
pub const METRIC_ORDERS_FILLED: &str = "orders_filled_total";
/// Orders rejected/failed counter metric name.
pub const METRIC_ORDERS_FAILED: &str = "orders_failed_total";
/// Positions opened counter metric name.
pub const METRIC_POSITIONS_OPENED: &str = "positions_opened_total";
/// Positions closed counter metric name.
pub const METRIC_POSITIONS_CLOSED: &str = "positions_closed_total";
/// Exit triggers counter metric name (labeled by reason).
pub const METRIC_EXITS_TRIGGERED: &str = "exits_triggered_total";
/// Confirmations processed counter metric name.
pub const METRIC_CONFIRMS_PROCESSED: &str = "confirms_processed_total";
/// Stale price observations counter metric name.
pub const METRIC_STALE_PRICES: &str = "stale_prices_total";
/// Quote fetch latency metric name.
pub const METRIC_QUOTE_LATENCY: &str = "quote_fetch_latency_ms";
/// Order submission latency metric name.
pub const METRIC_ORDER_SUBMIT_LATENCY: &str = "order_submit_latency_ms";
/// Watcher pass latency metric name.
pub const METRIC_WATCHER_TICK_LATENCY: &str = "watcher_tick_latency_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(METRIC_QUOTE_LATENCY, "LTP quote fetch latency in milliseconds");
    describe_histogram!(
        METRIC_ORDER_SUBMIT_LATENCY,
        "Order submission latency in milliseconds"
    );
    describe_histogram!(
        METRIC_WATCHER_TICK_LATENCY,
        "Exit watcher evaluation pass latency in milliseconds"
    );

    describe_counter!(METRIC_ORDERS_SUBMITTED, "Total number of orders submitted");
    describe_counter!(METRIC_ORDERS_FILLED, "Total number of orders filled");
    describe_counter!(
        METRIC_ORDERS_FAILED,
        "Total number of orders rejected or failed"
    );
    describe_counter!(METRIC_POSITIONS_OPENED, "Total number of positions opened");
    describe_counter!(METRIC_POSITIONS_CLOSED, "Total number of positions closed");
    describe_counter!(
        METRIC_EXITS_TRIGGERED,
        "Total number of TP/SL exit triggers, labeled by reason"
    );
    describe_counter!(
        METRIC_CONFIRMS_PROCESSED,
        "Total number of confirmations processed"
    );
    describe_counter!(
        METRIC_STALE_PRICES,
        "Total number of skipped stale price observations"
    );

    debug!("Metrics initialized");
}

/// Record quote fetch latency.
pub fn record_quote_latency(start: Instant, symbol: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_QUOTE_LATENCY, "symbol" => symbol.to_string()).record(latency_ms);
}

/// Record order submission latency.
pub fn record_order_submit_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_ORDER_SUBMIT_LATENCY).record(latency_ms);
}

/// Increment orders submitted counter.
pub fn inc_orders_submitted() {
    counter!(METRIC_ORDERS_SUBMITTED).increment(1);
}

/// Increment orders filled counter.
pub fn inc_orders_filled() {
    counter!(METRIC_ORDERS_FILLED).increment(1);
}

/// Increment orders failed counter.
pub fn inc_orders_failed() {
    counter!(METRIC_ORDERS_FAILED).increment(1);
}

/// Increment positions opened counter.
pub fn inc_positions_opened() {
    counter!(METRIC_POSITIONS_OPENED).increment(1);
}

/// Increment positions closed counter.
pub fn inc_positions_closed() {
    counter!(METRIC_POSITIONS_CLOSED).increment(1);
}

/// Increment exit triggers counter for a reason ("TP" or "SL").
pub fn inc_exits_triggered(reason: &str) {
    counter!(METRIC_EXITS_TRIGGERED, "reason" => reason.to_string()).increment(1);
}

/// Increment confirmations processed counter.
pub fn inc_confirms_processed() {
    counter!(METRIC_CONFIRMS_PROCESSED).increment(1);
}

/// Increment stale price counter.
pub fn inc_stale_prices() {
    counter!(METRIC_STALE_PRICES).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for a watcher evaluation pass.
pub fn timer_watcher_tick() -> LatencyTimer {
    LatencyTimer::new(METRIC_WATCHER_TICK_LATENCY)
}
