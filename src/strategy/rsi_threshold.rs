use super::{Strategy, StrategyContext};
use crate::indicators::IndicatorKind;
use crate::models::{Direction, Signal};

#[derive(Debug, Clone)]
pub struct RsiThresholdConfig {
    pub overbought: f64,
    pub oversold: f64,
    pub rsi_period: usize,
}

impl Default for RsiThresholdConfig {
    fn default() -> Self {
        Self {
            overbought: 70.0,
            oversold: 30.0,
            rsi_period: 14,
        }
    }
}

/// Fades RSI extremes: overbought -> PUT, oversold -> CALL
#[derive(Debug, Clone, Default)]
pub struct RsiThresholdStrategy {
    config: RsiThresholdConfig,
}

impl RsiThresholdStrategy {
    pub fn new(config: RsiThresholdConfig) -> Self {
        Self { config }
    }
}

impl Strategy for RsiThresholdStrategy {
    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signal {
        if !ctx.indicators.is_available(IndicatorKind::Rsi) {
            return Signal::no_trade("RSI not available yet");
        }

        let rsi = ctx.indicators.rsi;
        if rsi > self.config.overbought {
            let excess = (rsi - self.config.overbought) / (100.0 - self.config.overbought).max(1.0);
            Signal::trade(
                Direction::Put,
                0.5 + excess / 2.0,
                format!("RSI overbought ({:.1} > {:.0})", rsi, self.config.overbought),
            )
        } else if rsi < self.config.oversold {
            let excess = (self.config.oversold - rsi) / self.config.oversold.max(1.0);
            Signal::trade(
                Direction::Call,
                0.5 + excess / 2.0,
                format!("RSI oversold ({:.1} < {:.0})", rsi, self.config.oversold),
            )
        } else {
            Signal::no_trade(format!("RSI neutral ({:.1})", rsi))
        }
    }

    fn name(&self) -> &str {
        "RsiThresholdStrategy"
    }

    fn min_candles_required(&self) -> usize {
        self.config.rsi_period
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorSnapshot;
    use crate::models::MarketConditions;

    fn evaluate_rsi(rsi: f64) -> Signal {
        let indicators = IndicatorSnapshot {
            rsi,
            candle_count: 20,
            ..IndicatorSnapshot::default()
        };
        let conditions = MarketConditions::default();
        let ctx = StrategyContext {
            symbol: "R_100",
            indicators: &indicators,
            candles: &[],
            conditions: &conditions,
        };
        RsiThresholdStrategy::default().evaluate(&ctx)
    }

    #[test]
    fn test_overbought_gives_put() {
        let signal = evaluate_rsi(85.0);
        assert!(signal.should_trade);
        assert_eq!(signal.direction, Direction::Put);
        assert!((signal.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_oversold_gives_call() {
        let signal = evaluate_rsi(15.0);
        assert!(signal.should_trade);
        assert_eq!(signal.direction, Direction::Call);
    }

    #[test]
    fn test_neutral_does_not_trade() {
        assert!(!evaluate_rsi(50.0).should_trade);
        assert!(!evaluate_rsi(70.0).should_trade);
    }

    #[test]
    fn test_unavailable_rsi_does_not_trade() {
        let indicators = IndicatorSnapshot {
            candle_count: 5,
            ..IndicatorSnapshot::default()
        };
        let conditions = MarketConditions::default();
        let ctx = StrategyContext {
            symbol: "R_100",
            indicators: &indicators,
            candles: &[],
            conditions: &conditions,
        };
        let signal = RsiThresholdStrategy::default().evaluate(&ctx);
        assert!(!signal.should_trade);
        assert!(signal.reason.contains("not available"));
    }
}
