/// Trend classification from moving averages
///
/// Used for market conditions (cooldown re-checks, trade records) and for
/// higher-timeframe confirmation of signals.

use super::moving_average::calculate_sma;
use crate::models::{Candle, Trend};

/// Relative gap between the short and long MA below which the market is sideways
pub const SIDEWAYS_TOLERANCE: f64 = 0.0005;

/// Classify trend from a short and a long moving average
///
/// A zero long MA means "not yet available" and reads as sideways.
pub fn classify_trend(short_ma: f64, long_ma: f64, tolerance: f64) -> Trend {
    if long_ma <= 0.0 || short_ma <= 0.0 {
        return Trend::Sideways;
    }

    if short_ma > long_ma * (1.0 + tolerance) {
        Trend::Up
    } else if short_ma < long_ma * (1.0 - tolerance) {
        Trend::Down
    } else {
        Trend::Sideways
    }
}

/// Trend of a (resampled) candle series: MA(5) against MA(10) of the closes
pub fn higher_timeframe_trend(candles: &[Candle]) -> Trend {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    match (calculate_sma(&closes, 5), calculate_sma(&closes, 10)) {
        (Some(short), Some(long)) => classify_trend(short, long, SIDEWAYS_TOLERANCE),
        _ => Trend::Sideways,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .map(|&close| Candle {
                symbol: "TEST".to_string(),
                period_start: Utc::now(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn test_classify_trend() {
        assert_eq!(classify_trend(101.0, 100.0, SIDEWAYS_TOLERANCE), Trend::Up);
        assert_eq!(classify_trend(99.0, 100.0, SIDEWAYS_TOLERANCE), Trend::Down);
        assert_eq!(classify_trend(100.01, 100.0, SIDEWAYS_TOLERANCE), Trend::Sideways);
        assert_eq!(classify_trend(100.0, 0.0, SIDEWAYS_TOLERANCE), Trend::Sideways);
    }

    #[test]
    fn test_higher_timeframe_trend() {
        let rising: Vec<f64> = (0..12).map(|i| 100.0 + i as f64).collect();
        assert_eq!(higher_timeframe_trend(&candles(&rising)), Trend::Up);

        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert_eq!(higher_timeframe_trend(&candles(&falling)), Trend::Down);

        assert_eq!(higher_timeframe_trend(&candles(&rising[..6])), Trend::Sideways);
    }
}
