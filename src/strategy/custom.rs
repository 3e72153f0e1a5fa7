use serde::{Deserialize, Serialize};

use super::{Strategy, StrategyContext};
use crate::indicators::IndicatorField;
use crate::models::{Direction, Signal};

/// Confidence reported when every rule holds
pub const CUSTOM_CONFIDENCE: f64 = 0.7;

const EQ_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Operator {
    #[serde(rename = "gt", alias = ">")]
    Gt,
    #[serde(rename = "gte", alias = ">=")]
    Gte,
    #[serde(rename = "lt", alias = "<")]
    Lt,
    #[serde(rename = "lte", alias = "<=")]
    Lte,
    #[serde(rename = "eq", alias = "==")]
    Eq,
}

impl Operator {
    pub fn apply(self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Gt => value > threshold,
            Operator::Gte => value >= threshold,
            Operator::Lt => value < threshold,
            Operator::Lte => value <= threshold,
            Operator::Eq => (value - threshold).abs() <= EQ_TOLERANCE,
        }
    }
}

/// One user-defined condition, e.g. `rsi lt 35`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomRule {
    pub indicator: IndicatorField,
    pub operator: Operator,
    pub threshold: f64,
}

impl CustomRule {
    /// Whether the rule holds; an unavailable indicator never satisfies a rule
    pub fn holds(&self, ctx: &StrategyContext<'_>) -> bool {
        ctx.indicators
            .field(self.indicator)
            .map(|value| self.operator.apply(value, self.threshold))
            .unwrap_or(false)
    }
}

/// Trades when every configured rule holds, in the direction of the MACD histogram
#[derive(Debug, Clone, Default)]
pub struct CustomStrategy {
    rules: Vec<CustomRule>,
    default_direction: Direction,
}

impl CustomStrategy {
    pub fn new(rules: Vec<CustomRule>, default_direction: Direction) -> Self {
        Self {
            rules,
            default_direction,
        }
    }
}

impl Strategy for CustomStrategy {
    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signal {
        if self.rules.is_empty() {
            return Signal::no_trade("No custom rules configured");
        }

        if let Some(failed) = self.rules.iter().find(|rule| !rule.holds(ctx)) {
            return Signal::no_trade(format!(
                "Rule {:?} {:?} {} not met",
                failed.indicator, failed.operator, failed.threshold
            ));
        }

        let histogram = ctx.indicators.macd.histogram;
        let direction = if histogram > 0.0 {
            Direction::Call
        } else if histogram < 0.0 {
            Direction::Put
        } else {
            self.default_direction
        };

        Signal::trade(
            direction,
            CUSTOM_CONFIDENCE,
            format!("{} custom rules met, MACD hist {:.5}", self.rules.len(), histogram),
        )
    }

    fn name(&self) -> &str {
        "CustomStrategy"
    }

    fn min_candles_required(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{IndicatorSnapshot, Macd};
    use crate::models::MarketConditions;

    fn snapshot(rsi: f64, histogram: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi,
            macd: Macd {
                line: 0.1,
                signal: 0.1 - histogram,
                histogram,
            },
            last_close: 100.0,
            candle_count: 40,
            ..IndicatorSnapshot::default()
        }
    }

    fn evaluate(strategy: &CustomStrategy, indicators: &IndicatorSnapshot) -> Signal {
        let conditions = MarketConditions::default();
        strategy.evaluate(&StrategyContext {
            symbol: "R_100",
            indicators,
            candles: &[],
            conditions: &conditions,
        })
    }

    fn rsi_below(threshold: f64) -> CustomRule {
        CustomRule {
            indicator: IndicatorField::Rsi,
            operator: Operator::Lt,
            threshold,
        }
    }

    #[test]
    fn test_all_rules_must_hold() {
        let strategy = CustomStrategy::new(
            vec![
                rsi_below(40.0),
                CustomRule {
                    indicator: IndicatorField::Price,
                    operator: Operator::Gt,
                    threshold: 99.0,
                },
            ],
            Direction::Call,
        );

        let signal = evaluate(&strategy, &snapshot(35.0, -0.02));
        assert!(signal.should_trade);
        assert_eq!(signal.direction, Direction::Put);

        assert!(!evaluate(&strategy, &snapshot(45.0, -0.02)).should_trade);
    }

    #[test]
    fn test_zero_histogram_uses_default_direction() {
        let strategy = CustomStrategy::new(vec![rsi_below(40.0)], Direction::Put);
        let signal = evaluate(&strategy, &snapshot(35.0, 0.0));
        assert_eq!(signal.direction, Direction::Put);
    }

    #[test]
    fn test_unavailable_indicator_fails_rule() {
        let strategy = CustomStrategy::new(vec![rsi_below(40.0)], Direction::Call);
        let young = IndicatorSnapshot {
            candle_count: 3,
            ..snapshot(0.0, 0.0)
        };
        assert!(!evaluate(&strategy, &young).should_trade);
    }

    #[test]
    fn test_rule_waits_for_configured_rsi_period() {
        use crate::indicators::{IndicatorConfig, IndicatorEngine};
        use crate::strategy::test_support::candles_from_closes;

        let closes: Vec<f64> = (0..16).map(|i| 100.0 - i as f64).collect();
        let engine = IndicatorEngine::new(IndicatorConfig {
            rsi_period: 21,
            ..IndicatorConfig::default()
        });
        let indicators = engine.update(&candles_from_closes(&closes));

        assert_eq!(indicators.rsi, 0.0);
        assert_eq!(indicators.field(IndicatorField::Rsi), None);
        let strategy = CustomStrategy::new(vec![rsi_below(30.0)], Direction::Call);
        assert!(!evaluate(&strategy, &indicators).should_trade);
    }

    #[test]
    fn test_empty_rules_never_trade() {
        let strategy = CustomStrategy::default();
        assert!(!evaluate(&strategy, &snapshot(35.0, 0.1)).should_trade);
    }

    #[test]
    fn test_rules_deserialize_with_symbols() {
        let rule: CustomRule =
            serde_json::from_str(r#"{"indicator":"macd_histogram","operator":">","threshold":0.0}"#)
                .unwrap();
        assert_eq!(rule.indicator, IndicatorField::MacdHistogram);
        assert_eq!(rule.operator, Operator::Gt);
    }
}
