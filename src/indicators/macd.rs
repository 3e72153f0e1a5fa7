use serde::{Deserialize, Serialize};

use super::moving_average::calculate_ema_series;

/// Moving Average Convergence Divergence reading
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD line (fast EMA - slow EMA) for every bar from `slow - 1` onward
pub fn calculate_macd_line_series(prices: &[f64], fast: usize, slow: usize) -> Vec<f64> {
    if fast == 0 || fast > slow {
        return Vec::new();
    }

    let fast_series = calculate_ema_series(prices, fast);
    let slow_series = calculate_ema_series(prices, slow);
    let offset = slow - fast;

    slow_series
        .iter()
        .enumerate()
        .map(|(i, slow_ema)| fast_series[i + offset] - slow_ema)
        .collect()
}

/// Calculate MACD at the last price
///
/// The signal line is the EMA of the historical MACD line series. While
/// fewer than `slow + signal_period` prices exist the signal and histogram
/// read 0. Returns None below `slow` prices.
pub fn calculate_macd(prices: &[f64], fast: usize, slow: usize, signal_period: usize) -> Option<Macd> {
    let line_series = calculate_macd_line_series(prices, fast, slow);
    let line = *line_series.last()?;

    if prices.len() < slow + signal_period {
        return Some(Macd {
            line,
            signal: 0.0,
            histogram: 0.0,
        });
    }

    let signal = *calculate_ema_series(&line_series, signal_period).last()?;

    Some(Macd {
        line,
        signal,
        histogram: line - signal,
    })
}
