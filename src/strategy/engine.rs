use super::{
    ArbitrageConfig, ArbitrageStrategy, CustomStrategy, GridConfig, GridStrategy,
    MeanReversionConfig, MeanReversionStrategy, RsiThresholdConfig, RsiThresholdStrategy,
    ScoredStrategy, Strategy, StrategyContext, StrategyKind, TrendFollowConfig,
    TrendFollowStrategy, WinRateScorer,
};
use crate::config::TradeConfig;
use crate::indicators::{higher_timeframe_trend, IndicatorSnapshot};
use crate::market::resample;
use crate::models::{Candle, Direction, MarketConditions, Signal, TradeRecord, Trend};

/// Multi-timeframe confirmation looks at candles this many times wider
pub const HIGHER_TIMEFRAME_FACTOR: usize = 5;

/// Evaluates the configured strategy and applies the confirmation filters
///
/// Filters (candle pattern, higher timeframe) only suppress the current
/// evaluation; they never change engine state.
pub struct SignalEngine {
    rsi_threshold: RsiThresholdStrategy,
    trend_follow: TrendFollowStrategy,
    mean_reversion: MeanReversionStrategy,
    grid: GridStrategy,
    arbitrage: ArbitrageStrategy,
    custom: CustomStrategy,
    scored: ScoredStrategy,
    use_candle_patterns: bool,
    multi_timeframe: bool,
}

impl SignalEngine {
    pub fn new(config: &TradeConfig) -> Self {
        let ind = &config.indicators;
        let pair = match config.symbols.as_slice() {
            [a, b, ..] => Some((a.clone(), b.clone())),
            _ => None,
        };

        Self {
            rsi_threshold: RsiThresholdStrategy::new(RsiThresholdConfig {
                rsi_period: ind.rsi_period,
                ..RsiThresholdConfig::default()
            }),
            trend_follow: TrendFollowStrategy::new(TrendFollowConfig {
                min_candles: ind.adx_period.max(ind.short_ma_period),
                ..TrendFollowConfig::default()
            }),
            mean_reversion: MeanReversionStrategy::new(MeanReversionConfig {
                ma_period: ind.ma_period,
                ..MeanReversionConfig::default()
            }),
            grid: GridStrategy::new(GridConfig {
                ma_period: ind.ma_period,
                ..GridConfig::default()
            }),
            arbitrage: ArbitrageStrategy::new(ArbitrageConfig {
                pair,
                ..ArbitrageConfig::default()
            }),
            custom: CustomStrategy::new(config.custom_rules.clone(), config.default_direction),
            scored: ScoredStrategy::new(Box::new(WinRateScorer::new()), config.min_confidence),
            use_candle_patterns: config.use_candle_patterns,
            multi_timeframe: config.multi_timeframe,
        }
    }

    pub fn strategy(&self, kind: StrategyKind) -> &dyn Strategy {
        match kind {
            StrategyKind::RsiThreshold => &self.rsi_threshold,
            StrategyKind::TrendFollow => &self.trend_follow,
            StrategyKind::MeanReversion => &self.mean_reversion,
            StrategyKind::Grid => &self.grid,
            StrategyKind::Arbitrage => &self.arbitrage,
            StrategyKind::Custom => &self.custom,
            StrategyKind::Scored => &self.scored,
        }
    }

    /// Refit the scored model from settled trades
    pub fn retrain(&mut self, history: &[TradeRecord]) {
        self.scored.retrain(history);
    }

    pub fn scorer_trained(&self) -> bool {
        self.scored.is_trained()
    }

    /// Evaluate `kind` against the latest indicators and candles (oldest first)
    pub fn evaluate(
        &self,
        kind: StrategyKind,
        indicators: &IndicatorSnapshot,
        candles: &[Candle],
        conditions: &MarketConditions,
    ) -> Signal {
        let strategy = self.strategy(kind);
        let needed = strategy.min_candles_required();
        if candles.len() < needed {
            return Signal::no_trade(format!(
                "Insufficient data: {} candles, need {}",
                candles.len(),
                needed
            ));
        }

        let symbol = candles.last().map(|c| c.symbol.as_str()).unwrap_or_default();
        let ctx = StrategyContext {
            symbol,
            indicators,
            candles,
            conditions,
        };

        let mut signal = strategy.evaluate(&ctx);

        if signal.should_trade && self.use_candle_patterns {
            signal = match conditions.pattern {
                None => signal.suppress("no candle pattern"),
                Some(pattern) if !pattern.confirms(signal.direction) => {
                    let why = format!("{:?} disagrees", pattern);
                    signal.suppress(&why)
                }
                Some(_) => signal,
            };
        }

        if signal.should_trade && self.multi_timeframe {
            let higher = higher_timeframe_trend(&resample(candles, HIGHER_TIMEFRAME_FACTOR));
            let agrees = matches!(
                (higher, signal.direction),
                (Trend::Up, Direction::Call) | (Trend::Down, Direction::Put)
            );
            if !agrees {
                let why = format!("higher timeframe is {:?}", higher);
                signal = signal.suppress(&why);
            }
        }

        tracing::debug!(
            symbol,
            strategy = %kind,
            "Signal: trade={} {} conf={:.2} ({})",
            signal.should_trade,
            signal.direction.as_str(),
            signal.confidence,
            signal.reason
        );

        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::CandlePattern;
    use crate::strategy::test_support::candles_from_closes;

    fn overbought() -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: 85.0,
            candle_count: 60,
            ..IndicatorSnapshot::default()
        }
    }

    fn engine(configure: impl FnOnce(&mut TradeConfig)) -> SignalEngine {
        let mut config = TradeConfig::default();
        configure(&mut config);
        SignalEngine::new(&config)
    }

    #[test]
    fn test_insufficient_candles() {
        let engine = engine(|_| {});
        let candles = candles_from_closes(&[100.0; 5]);
        let signal = engine.evaluate(
            StrategyKind::RsiThreshold,
            &overbought(),
            &candles,
            &MarketConditions::default(),
        );
        assert!(!signal.should_trade);
        assert!(signal.reason.contains("Insufficient data"));
    }

    #[test]
    fn test_pattern_confirmation() {
        let engine = engine(|c| c.use_candle_patterns = true);
        let candles = candles_from_closes(&[100.0; 20]);
        let with = |pattern: Option<CandlePattern>| {
            let conditions = MarketConditions {
                pattern,
                ..MarketConditions::default()
            };
            engine.evaluate(StrategyKind::RsiThreshold, &overbought(), &candles, &conditions)
        };

        assert!(!with(None).should_trade);
        assert!(!with(Some(CandlePattern::Hammer)).should_trade);
        assert!(with(Some(CandlePattern::ShootingStar)).should_trade);
        assert!(with(Some(CandlePattern::Doji)).should_trade);
    }

    #[test]
    fn test_multi_timeframe_disagreement_suppresses() {
        let engine = engine(|c| c.multi_timeframe = true);
        let rising: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let candles = candles_from_closes(&rising);

        // Overbought PUT against a higher-timeframe uptrend
        let signal = engine.evaluate(
            StrategyKind::RsiThreshold,
            &overbought(),
            &candles,
            &MarketConditions::default(),
        );
        assert!(!signal.should_trade);
        assert!(signal.reason.contains("higher timeframe"));

        let falling: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        let signal = engine.evaluate(
            StrategyKind::RsiThreshold,
            &overbought(),
            &candles_from_closes(&falling),
            &MarketConditions::default(),
        );
        assert!(signal.should_trade);
    }

    #[test]
    fn test_scored_strategy_waits_for_training() {
        let engine = engine(|_| {});
        let candles = candles_from_closes(&[100.0; 30]);
        let signal = engine.evaluate(
            StrategyKind::Scored,
            &overbought(),
            &candles,
            &MarketConditions::default(),
        );
        assert!(!signal.should_trade);
        assert!(!engine.scorer_trained());
    }
}
