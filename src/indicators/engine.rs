use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{
    calculate_adx, calculate_bollinger, calculate_macd, calculate_obv, calculate_rsi,
    calculate_sentiment, calculate_sma, calculate_stochastic, calculate_volatility, correlate,
    Bollinger, CorrelationTable, Macd, Stochastic,
};
use crate::models::Candle;

/// Periods used by the indicator engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub ma_period: usize,
    pub short_ma_period: usize,
    pub bollinger_k: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub stochastic_period: usize,
    pub stochastic_smooth: usize,
    pub adx_period: usize,
    pub sentiment_window: usize,
    pub correlation_lookback: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            ma_period: 20,
            short_ma_period: 10,
            bollinger_k: 2.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            stochastic_period: 14,
            stochastic_smooth: 3,
            adx_period: 14,
            sentiment_window: 10,
            correlation_lookback: 50,
        }
    }
}

/// Indicator families, each with its own minimum history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Rsi,
    MovingAverage,
    ShortMovingAverage,
    Volatility,
    Bollinger,
    MacdLine,
    MacdSignal,
    Stochastic,
    Adx,
    Obv,
    Sentiment,
}

/// Full indicator state for one symbol, recomputed wholesale on every candle close
///
/// Fields that lack history read 0; use [`IndicatorSnapshot::is_available`]
/// before acting on them. The periods the snapshot was computed with travel
/// with it so availability follows the configured lookbacks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub moving_average: f64,
    pub short_moving_average: f64,
    pub volatility: f64,
    pub bollinger: Bollinger,
    pub macd: Macd,
    pub stochastic: Stochastic,
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub obv: f64,
    pub sentiment: f64,
    pub last_close: f64,
    pub candle_count: usize,
    #[serde(default)]
    pub periods: IndicatorConfig,
}

/// Indicator values addressable by user-defined rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorField {
    Price,
    Rsi,
    MovingAverage,
    Volatility,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    StochasticK,
    StochasticD,
    Adx,
    Obv,
    Sentiment,
}

impl IndicatorField {
    fn kind(self) -> Option<IndicatorKind> {
        match self {
            IndicatorField::Price => None,
            IndicatorField::Rsi => Some(IndicatorKind::Rsi),
            IndicatorField::MovingAverage => Some(IndicatorKind::MovingAverage),
            IndicatorField::Volatility => Some(IndicatorKind::Volatility),
            IndicatorField::BollingerUpper
            | IndicatorField::BollingerMiddle
            | IndicatorField::BollingerLower => Some(IndicatorKind::Bollinger),
            IndicatorField::MacdLine => Some(IndicatorKind::MacdLine),
            IndicatorField::MacdSignal | IndicatorField::MacdHistogram => {
                Some(IndicatorKind::MacdSignal)
            }
            IndicatorField::StochasticK | IndicatorField::StochasticD => {
                Some(IndicatorKind::Stochastic)
            }
            IndicatorField::Adx => Some(IndicatorKind::Adx),
            IndicatorField::Obv => Some(IndicatorKind::Obv),
            IndicatorField::Sentiment => Some(IndicatorKind::Sentiment),
        }
    }
}

impl IndicatorSnapshot {
    /// Whether `kind` was computed from enough candles to be a real reading
    pub fn is_available(&self, kind: IndicatorKind) -> bool {
        self.candle_count >= IndicatorEngine::min_candles(kind, &self.periods)
    }

    /// Value of a rule field, None while that indicator is unavailable
    pub fn field(&self, field: IndicatorField) -> Option<f64> {
        if let Some(kind) = field.kind() {
            if !self.is_available(kind) {
                return None;
            }
        } else if self.candle_count == 0 {
            return None;
        }

        Some(match field {
            IndicatorField::Price => self.last_close,
            IndicatorField::Rsi => self.rsi,
            IndicatorField::MovingAverage => self.moving_average,
            IndicatorField::Volatility => self.volatility,
            IndicatorField::BollingerUpper => self.bollinger.upper,
            IndicatorField::BollingerMiddle => self.bollinger.middle,
            IndicatorField::BollingerLower => self.bollinger.lower,
            IndicatorField::MacdLine => self.macd.line,
            IndicatorField::MacdSignal => self.macd.signal,
            IndicatorField::MacdHistogram => self.macd.histogram,
            IndicatorField::StochasticK => self.stochastic.k,
            IndicatorField::StochasticD => self.stochastic.d,
            IndicatorField::Adx => self.adx,
            IndicatorField::Obv => self.obv,
            IndicatorField::Sentiment => self.sentiment,
        })
    }

    /// Replace any non-finite value with 0
    fn sanitized(mut self) -> Self {
        let clean = |v: &mut f64| {
            if !v.is_finite() {
                *v = 0.0;
            }
        };
        for v in [
            &mut self.rsi,
            &mut self.moving_average,
            &mut self.short_moving_average,
            &mut self.volatility,
            &mut self.bollinger.upper,
            &mut self.bollinger.middle,
            &mut self.bollinger.lower,
            &mut self.macd.line,
            &mut self.macd.signal,
            &mut self.macd.histogram,
            &mut self.stochastic.k,
            &mut self.stochastic.d,
            &mut self.adx,
            &mut self.plus_di,
            &mut self.minus_di,
            &mut self.obv,
            &mut self.sentiment,
            &mut self.last_close,
        ] {
            clean(v);
        }
        self
    }
}

/// Computes indicator snapshots from candle history
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Minimum candles needed before `kind` is reported
    pub fn min_candles(kind: IndicatorKind, config: &IndicatorConfig) -> usize {
        match kind {
            IndicatorKind::Rsi => config.rsi_period,
            IndicatorKind::Stochastic => config.stochastic_period,
            IndicatorKind::Adx => config.adx_period,
            IndicatorKind::MovingAverage | IndicatorKind::Bollinger | IndicatorKind::Volatility => {
                config.ma_period
            }
            IndicatorKind::ShortMovingAverage => config.short_ma_period,
            IndicatorKind::Sentiment => config.sentiment_window * 2,
            IndicatorKind::MacdLine => config.macd_slow,
            IndicatorKind::MacdSignal => config.macd_slow + config.macd_signal,
            IndicatorKind::Obv => 2,
        }
    }

    /// Recompute every indicator from `candles` (oldest first)
    pub fn update(&self, candles: &[Candle]) -> IndicatorSnapshot {
        let cfg = &self.config;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let (adx, plus_di, minus_di) =
            calculate_adx(candles, cfg.adx_period).unwrap_or((0.0, 0.0, 0.0));

        let snapshot = IndicatorSnapshot {
            rsi: calculate_rsi(&closes, cfg.rsi_period).unwrap_or(0.0),
            moving_average: calculate_sma(&closes, cfg.ma_period).unwrap_or(0.0),
            short_moving_average: calculate_sma(&closes, cfg.short_ma_period).unwrap_or(0.0),
            volatility: calculate_volatility(&closes, cfg.ma_period).unwrap_or(0.0),
            bollinger: calculate_bollinger(&closes, cfg.ma_period, cfg.bollinger_k)
                .unwrap_or_default(),
            macd: calculate_macd(&closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal)
                .unwrap_or_default(),
            stochastic: calculate_stochastic(candles, cfg.stochastic_period, cfg.stochastic_smooth)
                .unwrap_or_default(),
            adx,
            plus_di,
            minus_di,
            obv: calculate_obv(candles),
            sentiment: calculate_sentiment(&closes, cfg.sentiment_window).unwrap_or(0.0),
            last_close: closes.last().copied().unwrap_or(0.0),
            candle_count: candles.len(),
            periods: cfg.clone(),
        }
        .sanitized();

        tracing::debug!(
            "Indicators ({} candles): RSI={:.2}, MA={:.4}, Vol={:.3}%, ADX={:.2}, MACD hist={:.5}",
            snapshot.candle_count,
            snapshot.rsi,
            snapshot.moving_average,
            snapshot.volatility,
            snapshot.adx,
            snapshot.macd.histogram
        );

        snapshot
    }

    /// Pairwise correlation of the trailing closes of every symbol
    pub fn correlate(&self, candles_by_symbol: &HashMap<String, Vec<Candle>>) -> CorrelationTable {
        correlate(candles_by_symbol, self.config.correlation_lookback)
    }
}
