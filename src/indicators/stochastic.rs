use serde::{Deserialize, Serialize};

use crate::models::Candle;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Stochastic {
    pub k: f64,
    pub d: f64,
}

/// Stochastic oscillator (%K over `period` candles, %D = mean of the last `smooth` %K values)
///
/// %D averages whatever %K history exists (up to `smooth` values). A flat
/// high/low range gives %K = 0.
pub fn calculate_stochastic(candles: &[Candle], period: usize, smooth: usize) -> Option<Stochastic> {
    if period == 0 || smooth == 0 || candles.len() < period {
        return None;
    }

    let k_values: Vec<f64> = (period - 1..candles.len())
        .rev()
        .take(smooth)
        .map(|end| {
            let window = &candles[end + 1 - period..=end];
            let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            let range = highest - lowest;
            if range > 0.0 {
                (candles[end].close - lowest) / range * 100.0
            } else {
                0.0
            }
        })
        .collect();

    let k = k_values[0];
    let d = k_values.iter().sum::<f64>() / k_values.len() as f64;

    Some(Stochastic { k, d })
}
