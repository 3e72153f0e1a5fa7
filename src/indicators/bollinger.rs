use serde::{Deserialize, Serialize};

use super::moving_average::{calculate_sma, calculate_std_dev};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl Bollinger {
    /// (upper - lower) / middle, 0 when the middle band is 0
    pub fn width_ratio(&self) -> f64 {
        if self.middle == 0.0 {
            0.0
        } else {
            (self.upper - self.lower) / self.middle
        }
    }
}

/// Bollinger Bands: SMA(period) ± k standard deviations
pub fn calculate_bollinger(prices: &[f64], period: usize, k: f64) -> Option<Bollinger> {
    let middle = calculate_sma(prices, period)?;
    let std_dev = calculate_std_dev(prices, period)?;

    Some(Bollinger {
        upper: middle + k * std_dev,
        middle,
        lower: middle - k * std_dev,
    })
}
