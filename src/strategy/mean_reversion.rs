use super::{Strategy, StrategyContext};
use crate::indicators::IndicatorKind;
use crate::models::{Direction, Signal};

/// Mean reversion strategy
///
/// Bets on a stretched price snapping back to its long moving average.
///
/// Entry conditions (ALL must be true):
/// - Price deviates from the MA by more than `deviation_multiplier` x volatility (both in %)
/// - ADX below `adx_ceiling` (ranging market, not a trend)
///
/// Direction is toward the mean: above the MA -> PUT, below -> CALL.
#[derive(Debug, Clone, Default)]
pub struct MeanReversionStrategy {
    config: MeanReversionConfig,
}

#[derive(Debug, Clone)]
pub struct MeanReversionConfig {
    /// Deviation threshold as a multiple of volatility
    pub deviation_multiplier: f64,

    /// Only trade while ADX is below this
    pub adx_ceiling: f64,

    /// Long MA period (must match the indicator engine)
    pub ma_period: usize,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            deviation_multiplier: 1.5,
            adx_ceiling: 20.0,
            ma_period: 20,
        }
    }
}

impl MeanReversionStrategy {
    pub fn new(config: MeanReversionConfig) -> Self {
        Self { config }
    }
}

impl Strategy for MeanReversionStrategy {
    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signal {
        let ind = ctx.indicators;
        let ready = [
            IndicatorKind::MovingAverage,
            IndicatorKind::Volatility,
            IndicatorKind::Adx,
        ]
        .into_iter()
        .all(|kind| ind.is_available(kind));
        if !ready || ind.moving_average <= 0.0 {
            return Signal::no_trade("MA / volatility / ADX not available yet");
        }

        if ind.adx >= self.config.adx_ceiling {
            return Signal::no_trade(format!(
                "Trending market (ADX {:.1} >= {:.0})",
                ind.adx, self.config.adx_ceiling
            ));
        }

        let price = ctx.price();
        let deviation_pct = (price - ind.moving_average) / ind.moving_average * 100.0;
        let threshold = self.config.deviation_multiplier * ind.volatility;

        if deviation_pct.abs() <= threshold {
            return Signal::no_trade(format!(
                "Deviation {:.2}% within {:.2}%",
                deviation_pct, threshold
            ));
        }

        let confidence = if threshold > 0.0 {
            deviation_pct.abs() / (2.0 * threshold)
        } else {
            1.0
        };
        let direction = if deviation_pct > 0.0 {
            Direction::Put
        } else {
            Direction::Call
        };

        Signal::trade(
            direction,
            confidence,
            format!(
                "Price {:.2}% from MA (threshold {:.2}%), ADX {:.1}",
                deviation_pct, threshold, ind.adx
            ),
        )
    }

    fn name(&self) -> &str {
        "MeanReversionStrategy"
    }

    fn min_candles_required(&self) -> usize {
        self.config.ma_period
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MarketConditions;
    use crate::strategy::test_support::{candles_from_closes, snapshot_for};

    fn evaluate(closes: &[f64]) -> Signal {
        let candles = candles_from_closes(closes);
        let indicators = snapshot_for(&candles);
        let conditions = MarketConditions::default();
        MeanReversionStrategy::default().evaluate(&StrategyContext {
            symbol: "R_100",
            indicators: &indicators,
            candles: &candles,
            conditions: &conditions,
        })
    }

    #[test]
    fn test_spike_above_mean_gives_put() {
        let mut closes = vec![100.0; 29];
        closes.push(103.0);

        let signal = evaluate(&closes);
        assert!(signal.should_trade, "{}", signal.reason);
        assert_eq!(signal.direction, Direction::Put);
    }

    #[test]
    fn test_drop_below_mean_gives_call() {
        let mut closes = vec![100.0; 29];
        closes.push(97.0);

        let signal = evaluate(&closes);
        assert!(signal.should_trade, "{}", signal.reason);
        assert_eq!(signal.direction, Direction::Call);
    }

    #[test]
    fn test_trending_market_is_skipped() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 2.0).collect();
        let signal = evaluate(&closes);
        assert!(!signal.should_trade);
        assert!(signal.reason.contains("Trending"));
    }

    #[test]
    fn test_flat_market_is_skipped() {
        assert!(!evaluate(&[100.0; 30]).should_trade);
    }
}
