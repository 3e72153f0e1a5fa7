/// Calculate Simple Moving Average (SMA) over the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA) at the last price
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    calculate_ema_series(prices, period).last().copied()
}

/// EMA value for every bar that has a full `period`-bar window
///
/// Each value is seeded with the oldest price of its trailing window and
/// smoothed over the remaining bars with k = 2 / (period + 1). The first
/// element corresponds to `prices[period - 1]`.
pub fn calculate_ema_series(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    (period - 1..prices.len())
        .map(|end| {
            let window = &prices[end + 1 - period..=end];
            let mut ema = window[0];
            for price in &window[1..] {
                ema = (price - ema) * multiplier + ema;
            }
            ema
        })
        .collect()
}

/// Population standard deviation of the last `period` prices
pub fn calculate_std_dev(prices: &[f64], period: usize) -> Option<f64> {
    let mean = calculate_sma(prices, period)?;
    let variance = prices
        .iter()
        .rev()
        .take(period)
        .map(|p| (p - mean).powi(2))
        .sum::<f64>()
        / period as f64;

    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        let sma = calculate_sma(&prices, 5);
        assert_eq!(sma, Some(104.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![100.0, 102.0];
        let sma = calculate_sma(&prices, 5);
        assert!(sma.is_none());
    }

    #[test]
    fn test_ema_seeded_from_window_start() {
        // period 3, k = 0.5: seed 1.0 -> 1.5 -> 2.25
        let prices = vec![1.0, 2.0, 3.0];
        assert_eq!(calculate_ema(&prices, 3), Some(2.25));

        // next window starts at 2.0: 2.0 -> 2.5 -> 3.25
        let prices = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(calculate_ema_series(&prices, 3), vec![2.25, 3.25]);
    }

    #[test]
    fn test_ema_rising_prices() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0, 110.0];
        let ema = calculate_ema(&prices, 5).unwrap();
        assert!(ema > 104.0 && ema < 110.0);
    }

    #[test]
    fn test_std_dev() {
        let prices = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(calculate_std_dev(&prices, 8), Some(2.0));
        assert_eq!(calculate_std_dev(&[5.0; 20], 20), Some(0.0));
    }
}
