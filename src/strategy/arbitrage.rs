use super::{Strategy, StrategyContext};
use crate::models::{Direction, Signal};

#[derive(Debug, Clone)]
pub struct ArbitrageConfig {
    /// Symbols compared; when None the first two tracked symbols are used
    pub pair: Option<(String, String)>,
    /// Minimum spread as % of the lesser price
    pub spread_threshold_pct: f64,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            pair: None,
            spread_threshold_pct: 1.0,
        }
    }
}

/// Two-symbol spread trade
///
/// When the spread between the pair exceeds the threshold, the evaluated
/// symbol is traded away from the higher-priced leg: PUT if it is the
/// higher one, CALL if it is the lower one.
#[derive(Debug, Clone, Default)]
pub struct ArbitrageStrategy {
    config: ArbitrageConfig,
}

impl ArbitrageStrategy {
    pub fn new(config: ArbitrageConfig) -> Self {
        Self { config }
    }

    fn pair<'a>(&'a self, ctx: &'a StrategyContext<'_>) -> Option<(&'a str, &'a str)> {
        match &self.config.pair {
            Some((a, b)) => Some((a.as_str(), b.as_str())),
            None => {
                let mut symbols = ctx.conditions.peer_prices.keys();
                Some((symbols.next()?.as_str(), symbols.next()?.as_str()))
            }
        }
    }
}

impl Strategy for ArbitrageStrategy {
    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signal {
        let Some((a, b)) = self.pair(ctx) else {
            return Signal::no_trade("Arbitrage needs two symbols");
        };

        let other = if ctx.symbol == a {
            b
        } else if ctx.symbol == b {
            a
        } else {
            return Signal::no_trade(format!("{} is not in the arbitrage pair", ctx.symbol));
        };

        let prices = &ctx.conditions.peer_prices;
        let own = prices.get(ctx.symbol).copied().unwrap_or_else(|| ctx.price());
        let Some(&peer) = prices.get(other) else {
            return Signal::no_trade(format!("No price for {} yet", other));
        };

        let lesser = own.min(peer);
        if lesser <= 0.0 {
            return Signal::no_trade("Missing leg price");
        }

        let spread_pct = (own - peer).abs() / lesser * 100.0;
        if spread_pct <= self.config.spread_threshold_pct {
            return Signal::no_trade(format!(
                "Spread {:.2}% within {:.2}%",
                spread_pct, self.config.spread_threshold_pct
            ));
        }

        let direction = if own > peer {
            Direction::Put
        } else {
            Direction::Call
        };
        Signal::trade(
            direction,
            spread_pct / (2.0 * self.config.spread_threshold_pct.max(f64::EPSILON)),
            format!(
                "Spread {:.2}% between {} ({:.4}) and {} ({:.4})",
                spread_pct, ctx.symbol, own, other, peer
            ),
        )
    }

    fn name(&self) -> &str {
        "ArbitrageStrategy"
    }

    fn min_candles_required(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorSnapshot;
    use crate::models::MarketConditions;

    fn evaluate(symbol: &str, prices: &[(&str, f64)]) -> Signal {
        let indicators = IndicatorSnapshot::default();
        let conditions = MarketConditions {
            peer_prices: prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
            ..MarketConditions::default()
        };
        ArbitrageStrategy::default().evaluate(&StrategyContext {
            symbol,
            indicators: &indicators,
            candles: &[],
            conditions: &conditions,
        })
    }

    #[test]
    fn test_higher_leg_gets_put() {
        let signal = evaluate("R_50", &[("R_50", 102.0), ("R_75", 100.0)]);
        assert!(signal.should_trade);
        assert_eq!(signal.direction, Direction::Put);
    }

    #[test]
    fn test_lower_leg_gets_call() {
        let signal = evaluate("R_75", &[("R_50", 102.0), ("R_75", 100.0)]);
        assert!(signal.should_trade);
        assert_eq!(signal.direction, Direction::Call);
    }

    #[test]
    fn test_narrow_spread_is_skipped() {
        assert!(!evaluate("R_50", &[("R_50", 100.5), ("R_75", 100.0)]).should_trade);
    }

    #[test]
    fn test_single_symbol_is_skipped() {
        let signal = evaluate("R_50", &[("R_50", 100.0)]);
        assert!(!signal.should_trade);
        assert!(signal.reason.contains("two symbols"));
    }
}
