use super::moving_average::{calculate_sma, calculate_std_dev};

/// Volatility as a percentage: stddev(period) / mean(period) * 100
///
/// Returns 0 when the mean is 0.
pub fn calculate_volatility(prices: &[f64], period: usize) -> Option<f64> {
    let mean = calculate_sma(prices, period)?;
    let std_dev = calculate_std_dev(prices, period)?;

    if mean == 0.0 {
        return Some(0.0);
    }

    Some(std_dev / mean * 100.0)
}

/// Sentiment proxy: percentage change of the mean close of the last `window`
/// prices against the mean of the `window` prices before them
pub fn calculate_sentiment(prices: &[f64], window: usize) -> Option<f64> {
    if window == 0 || prices.len() < window * 2 {
        return None;
    }

    let recent = calculate_sma(prices, window)?;
    let prior = calculate_sma(&prices[..prices.len() - window], window)?;

    if prior == 0.0 {
        return Some(0.0);
    }

    Some((recent - prior) / prior * 100.0)
}

/// True when volatility exceeds the spike threshold (percent)
pub fn is_volatility_spike(volatility: f64, threshold_pct: f64) -> bool {
    volatility > threshold_pct
}
