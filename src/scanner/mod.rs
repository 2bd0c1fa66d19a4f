//! Candidate scanner.
//!
//! Builds a rolling close history from observed LTPs and flags symbols where
//! a fast/slow EMA crossover, an RSI band, and the daily pivot agree on a
//! direction. Signal math: EMA(9) over EMA(21) with RSI(14) in (30, 70),
//! long bias above the pivot and short bias below.

pub mod indicators;

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::broker::{Broker, DayOhlc};
use crate::engine::position::Side;

use indicators::{ema, pivot_levels, rsi, PivotLevels};

/// Fast EMA period.
pub const EMA_FAST: usize = 9;
/// Slow EMA period.
pub const EMA_SLOW: usize = 21;
/// RSI period.
pub const RSI_PERIOD: usize = 14;

/// Maximum samples retained per symbol.
const HISTORY_CAP: usize = 128;

/// Rolling per-symbol close history, fed by every LTP observation.
#[derive(Default)]
pub struct PriceHistory {
    series: Mutex<HashMap<String, VecDeque<Decimal>>>,
}

impl PriceHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observed price.
    pub fn record(&self, symbol: &str, price: Decimal) {
        let mut series = self.series.lock().expect("history lock");
        let prices = series.entry(symbol.to_string()).or_default();
        if prices.len() >= HISTORY_CAP {
            prices.pop_front();
        }
        prices.push_back(price);
    }

    /// The recorded closes for a symbol, oldest first.
    pub fn closes(&self, symbol: &str) -> Vec<Decimal> {
        self.series
            .lock()
            .expect("history lock")
            .get(symbol)
            .map(|prices| prices.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of samples recorded for a symbol.
    pub fn sample_count(&self, symbol: &str) -> usize {
        self.series
            .lock()
            .expect("history lock")
            .get(symbol)
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}

/// A scan hit: the indicators agree on a direction for this symbol.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSignal {
    /// NSE tradingsymbol.
    pub symbol: String,
    /// Suggested direction.
    pub side: Side,
    /// Last observed price.
    pub last_price: Decimal,
    /// Fast EMA value.
    pub ema_fast: Decimal,
    /// Slow EMA value.
    pub ema_slow: Decimal,
    /// RSI value.
    pub rsi: Decimal,
    /// Daily pivot levels used for the bias filter.
    pub pivots: PivotLevels,
}

/// Evaluate the signal for one symbol from its close history and the daily
/// OHLC. Returns `None` when there is not enough history or the indicators
/// disagree.
pub fn evaluate_signal(symbol: &str, closes: &[Decimal], day: &DayOhlc) -> Option<ScanSignal> {
    let last_price = *closes.last()?;
    let ema_fast = ema(closes, EMA_FAST)?;
    let ema_slow = ema(closes, EMA_SLOW)?;
    let rsi = rsi(closes, RSI_PERIOD)?;
    let pivots = pivot_levels(day);

    // Extreme RSI readings are skipped either way.
    let thirty = Decimal::from(30u8);
    let seventy = Decimal::from(70u8);
    if rsi <= thirty || rsi >= seventy {
        return None;
    }

    let side = if ema_fast > ema_slow && last_price > pivots.pivot {
        Side::Long
    } else if ema_fast < ema_slow && last_price < pivots.pivot {
        Side::Short
    } else {
        return None;
    };

    Some(ScanSignal {
        symbol: symbol.to_string(),
        side,
        last_price,
        ema_fast,
        ema_slow,
        rsi,
        pivots,
    })
}

/// Scan a set of symbols against the recorded history. Symbols with too few
/// samples or failing quote lookups are skipped silently; the scan is a
/// best-effort sweep, not a guarantee.
pub async fn scan<B: Broker + ?Sized>(
    broker: &B,
    history: &PriceHistory,
    symbols: &[&str],
) -> Vec<ScanSignal> {
    let mut signals = Vec::new();

    for symbol in symbols {
        let closes = history.closes(symbol);
        if closes.len() < EMA_SLOW + 1 {
            continue;
        }

        let day = match broker.day_ohlc(symbol).await {
            Ok(day) => day,
            Err(e) => {
                debug!(%symbol, error = %e, "Skipping symbol, OHLC unavailable");
                continue;
            }
        };

        if let Some(signal) = evaluate_signal(symbol, &closes, &day) {
            signals.push(signal);
        }
    }

    signals
}
