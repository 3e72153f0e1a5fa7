use super::{Strategy, StrategyContext};
use crate::indicators::IndicatorKind;
use crate::models::{Direction, Signal};

#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Grid only runs in calm markets (volatility % below this)
    pub max_volatility: f64,
    /// Grid level at which confidence saturates
    pub levels: u32,
    pub ma_period: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_volatility: 2.0,
            levels: 3,
            ma_period: 20,
        }
    }
}

/// Grid trading around the Bollinger middle band
///
/// Grid step = middle x volatility%. A price at least one step above the
/// middle sells (PUT), one step below buys (CALL).
#[derive(Debug, Clone, Default)]
pub struct GridStrategy {
    config: GridConfig,
}

impl GridStrategy {
    pub fn new(config: GridConfig) -> Self {
        Self { config }
    }
}

impl Strategy for GridStrategy {
    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signal {
        let ind = ctx.indicators;
        if !ind.is_available(IndicatorKind::Bollinger) || !ind.is_available(IndicatorKind::Volatility) {
            return Signal::no_trade("Bollinger / volatility not available yet");
        }

        if ind.volatility >= self.config.max_volatility {
            return Signal::no_trade(format!(
                "Too volatile for grid ({:.2}% >= {:.1}%)",
                ind.volatility, self.config.max_volatility
            ));
        }

        let step = ind.bollinger.middle * ind.volatility / 100.0;
        if step <= 0.0 {
            return Signal::no_trade("Zero grid step");
        }

        let offset = ctx.price() - ind.bollinger.middle;
        let level = (offset / step).trunc();
        if level == 0.0 {
            return Signal::no_trade(format!("Inside first grid step ({:.4})", offset));
        }

        let direction = if level > 0.0 {
            Direction::Put
        } else {
            Direction::Call
        };
        Signal::trade(
            direction,
            level.abs() / self.config.levels.max(1) as f64,
            format!("Grid level {:+} (step {:.4})", level as i64, step),
        )
    }

    fn name(&self) -> &str {
        "GridStrategy"
    }

    fn min_candles_required(&self) -> usize {
        self.config.ma_period
    }
}
