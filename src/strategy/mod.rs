// Trading strategy module
pub mod arbitrage;
pub mod custom;
pub mod engine;
pub mod grid;
pub mod mean_reversion;
pub mod rsi_threshold;
pub mod scored;
pub mod selector;
pub mod trend_follow;

pub use arbitrage::{ArbitrageConfig, ArbitrageStrategy};
pub use custom::{CustomRule, CustomStrategy, Operator};
pub use engine::SignalEngine;
pub use grid::{GridConfig, GridStrategy};
pub use mean_reversion::{MeanReversionConfig, MeanReversionStrategy};
pub use rsi_threshold::{RsiThresholdConfig, RsiThresholdStrategy};
pub use scored::{Scorer, ScoredStrategy, WinRateScorer};
pub use selector::StrategySelector;
pub use trend_follow::{TrendFollowConfig, TrendFollowStrategy};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::indicators::IndicatorSnapshot;
use crate::models::{Candle, MarketConditions, Signal};

/// Strategy identifiers as they appear in configuration
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    RsiThreshold,
    TrendFollow,
    MeanReversion,
    Grid,
    Arbitrage,
    Custom,
    Scored,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 7] = [
        StrategyKind::RsiThreshold,
        StrategyKind::TrendFollow,
        StrategyKind::MeanReversion,
        StrategyKind::Grid,
        StrategyKind::Arbitrage,
        StrategyKind::Custom,
        StrategyKind::Scored,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::RsiThreshold => "rsi-threshold",
            StrategyKind::TrendFollow => "trend-follow",
            StrategyKind::MeanReversion => "mean-reversion",
            StrategyKind::Grid => "grid",
            StrategyKind::Arbitrage => "arbitrage",
            StrategyKind::Custom => "custom",
            StrategyKind::Scored => "scored",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown strategy '{}'", s))
    }
}

/// Everything a strategy may look at for one evaluation
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub symbol: &'a str,
    pub indicators: &'a IndicatorSnapshot,
    pub candles: &'a [Candle],
    pub conditions: &'a MarketConditions,
}

impl StrategyContext<'_> {
    /// Close of the most recent sealed candle
    pub fn price(&self) -> f64 {
        self.candles
            .last()
            .map(|c| c.close)
            .unwrap_or(self.indicators.last_close)
    }
}

/// Base trait for all trading strategies
///
/// Strategies are pure functions of the context: no hidden state is read or
/// written during evaluation.
pub trait Strategy: Send + Sync {
    /// Produce a directional recommendation, or a no-trade signal with a reason
    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signal;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required for this strategy
    fn min_candles_required(&self) -> usize;
}
