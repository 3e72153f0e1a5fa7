use super::{Strategy, StrategyContext};
use crate::indicators::IndicatorKind;
use crate::models::{Direction, Signal};

#[derive(Debug, Clone)]
pub struct TrendFollowConfig {
    /// ADX must exceed this for the trend to count
    pub adx_threshold: f64,
    /// ADX at which confidence saturates
    pub adx_full_confidence: f64,
    pub min_candles: usize,
}

impl Default for TrendFollowConfig {
    fn default() -> Self {
        Self {
            adx_threshold: 20.0,
            adx_full_confidence: 50.0,
            min_candles: 14,
        }
    }
}

/// Trades with a strong trend: price above the short MA -> CALL, below -> PUT
#[derive(Debug, Clone, Default)]
pub struct TrendFollowStrategy {
    config: TrendFollowConfig,
}

impl TrendFollowStrategy {
    pub fn new(config: TrendFollowConfig) -> Self {
        Self { config }
    }
}

impl Strategy for TrendFollowStrategy {
    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signal {
        let ind = ctx.indicators;
        if !ind.is_available(IndicatorKind::Adx) || !ind.is_available(IndicatorKind::ShortMovingAverage) {
            return Signal::no_trade("ADX / short MA not available yet");
        }

        if ind.adx <= self.config.adx_threshold {
            return Signal::no_trade(format!(
                "Trend too weak (ADX {:.1} <= {:.0})",
                ind.adx, self.config.adx_threshold
            ));
        }

        let price = ctx.price();
        let confidence = ind.adx / self.config.adx_full_confidence;

        if price > ind.short_moving_average {
            Signal::trade(
                Direction::Call,
                confidence,
                format!(
                    "Uptrend: price {:.4} above MA {:.4}, ADX {:.1}",
                    price, ind.short_moving_average, ind.adx
                ),
            )
        } else if price < ind.short_moving_average {
            Signal::trade(
                Direction::Put,
                confidence,
                format!(
                    "Downtrend: price {:.4} below MA {:.4}, ADX {:.1}",
                    price, ind.short_moving_average, ind.adx
                ),
            )
        } else {
            Signal::no_trade("Price sitting on the short MA")
        }
    }

    fn name(&self) -> &str {
        "TrendFollowStrategy"
    }

    fn min_candles_required(&self) -> usize {
        self.config.min_candles
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
        TrendFollowStrategy::default().evaluate(&StrategyContext {
            symbol: "R_100",
            indicators: &indicators,
            candles: &candles,
            conditions: &conditions,
        })
    }

    #[test]
    fn test_uptrend_gives_call() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let signal = evaluate(&closes);
        assert!(signal.should_trade);
        assert_eq!(signal.direction, Direction::Call);
    }

    #[test]
    fn test_downtrend_gives_put() {
        let closes: Vec<f64> = (0..30).map(|i| 200.0 - i as f64).collect();
        let signal = evaluate(&closes);
        assert!(signal.should_trade);
        assert_eq!(signal.direction, Direction::Put);
    }

    #[test]
    fn test_flat_market_is_skipped() {
        let signal = evaluate(&[100.0; 30]);
        assert!(!signal.should_trade);
        assert!(signal.reason.contains("too weak"));
    }

    #[test]
    fn test_insufficient_history_is_skipped() {
        let closes: Vec<f64> = (0..5).map(|i| 100.0 + i as f64).collect();
        let signal = evaluate(&closes);
        assert!(!signal.should_trade);
        assert!(signal.reason.contains("not available"));
    }
}
