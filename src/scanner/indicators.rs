//! Technical indicators in decimal arithmetic.

use rust_decimal::Decimal;

use crate::broker::DayOhlc;

/// Simple moving average over the last `period` values.
pub fn sma(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let sum: Decimal = prices.iter().rev().take(period).sum();
    Some(sum / Decimal::from(period as u64))
}

/// Exponential moving average, seeded with the SMA of the first `period`
/// values and smoothed with `2 / (period + 1)`.
pub fn ema(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let multiplier = Decimal::TWO / Decimal::from(period as u64 + 1);
    let mut ema = sma(&prices[0..period], period)?;
    for price in &prices[period..] {
        ema = (*price - ema) * multiplier + ema;
    }
    Some(ema)
}

/// Relative Strength Index over `period` price changes.
///
/// Above 70 is conventionally overbought, below 30 oversold.
pub fn rsi(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let mut gains = Decimal::ZERO;
    let mut losses = Decimal::ZERO;

    let start = prices.len() - period - 1;
    for window in prices[start..].windows(2) {
        let change = window[1] - window[0];
        if change > Decimal::ZERO {
            gains += change;
        } else {
            losses -= change;
        }
    }

    if losses == Decimal::ZERO {
        return Some(Decimal::ONE_HUNDRED);
    }

    let rs = gains / losses;
    Some(Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED / (Decimal::ONE + rs))
}

/// Daily pivot levels derived from the prior session's high/low/close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PivotLevels {
    /// Central pivot: (H + L + C) / 3.
    pub pivot: Decimal,
    /// First resistance: 2P - L.
    pub r1: Decimal,
    /// First support: 2P - H.
    pub s1: Decimal,
}

/// Compute classic pivot levels from a prior-session OHLC.
pub fn pivot_levels(prior: &DayOhlc) -> PivotLevels {
    let pivot = (prior.high + prior.low + prior.close) / Decimal::from(3u8);
    PivotLevels {
        pivot,
        r1: Decimal::TWO * pivot - prior.low,
        s1: Decimal::TWO * pivot - prior.high,
    }
}
