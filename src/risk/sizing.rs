use serde::{Deserialize, Serialize};

use crate::execution::history::TradeStats;

/// Venue minimum stake
pub const MIN_STAKE: f64 = 0.35;
/// Absolute stake ceiling
pub const MAX_STAKE: f64 = 100.0;
/// Stake ceiling as a share of the balance
pub const MAX_BALANCE_FRACTION: f64 = 0.10;
/// Kelly fraction cap
pub const KELLY_CAP: f64 = 0.10;
/// Trades needed before Kelly sizing replaces fixed sizing
pub const KELLY_MIN_TRADES: usize = 10;

/// Base stake sizing policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StakePolicy {
    #[default]
    Fixed,
    VolatilityScaled,
    Kelly,
}

/// Progression applied on top of the base stake after each result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StakeOverlay {
    #[default]
    None,
    Martingale,
    Dalembert,
}

/// Inputs for one sizing decision
#[derive(Debug, Clone, Copy)]
pub struct SizingInput {
    pub balance: f64,
    pub initial_stake: f64,
    pub fixed_fraction: f64,
    pub volatility: f64,
    /// Session PnL as % of balance (negative when losing)
    pub drawdown_pct: f64,
    pub stats: TradeStats,
}

/// Scale a stake down in volatile markets and while the session is losing
///
/// Each factor is floored at 0.5.
pub fn derate(stake: f64, volatility: f64, drawdown_pct: f64) -> f64 {
    let volatility_factor = (1.0 - volatility.max(0.0) / 10.0).clamp(0.5, 1.0);
    let drawdown_factor = (1.0 + drawdown_pct.min(0.0) / 100.0).clamp(0.5, 1.0);
    stake * volatility_factor * drawdown_factor
}

/// Kelly fraction f = p - (1 - p) / b, capped to [0, KELLY_CAP]
pub fn kelly_fraction(stats: &TradeStats) -> f64 {
    let p = stats.win_rate;
    let fraction = if stats.avg_loss > 0.0 && stats.avg_win > 0.0 {
        let b = stats.avg_win / stats.avg_loss;
        p - (1.0 - p) / b
    } else if stats.avg_loss == 0.0 {
        p
    } else {
        0.0
    };
    fraction.clamp(0.0, KELLY_CAP)
}

/// Base stake before overlays and clamping
pub fn base_stake(policy: StakePolicy, input: &SizingInput) -> f64 {
    let fixed = || derate(input.balance * input.fixed_fraction, input.volatility, input.drawdown_pct);

    match policy {
        StakePolicy::Fixed => fixed(),
        StakePolicy::VolatilityScaled => derate(
            input.initial_stake / (1.0 + input.volatility.max(0.0) / 100.0),
            input.volatility,
            input.drawdown_pct,
        ),
        StakePolicy::Kelly => {
            if input.stats.trades < KELLY_MIN_TRADES {
                fixed()
            } else {
                derate(
                    input.balance * kelly_fraction(&input.stats),
                    input.volatility,
                    input.drawdown_pct,
                )
            }
        }
    }
}

/// Apply the martingale / d'Alembert progression
///
/// `previous` is the stake of the last trade, `base` the freshly sized stake.
pub fn apply_overlay(
    overlay: StakeOverlay,
    base: f64,
    previous: f64,
    last_win: Option<bool>,
    multiplier: f64,
    unit: f64,
) -> f64 {
    match (overlay, last_win) {
        (StakeOverlay::None, _) | (_, None) => base,
        (StakeOverlay::Martingale, Some(true)) => base,
        (StakeOverlay::Martingale, Some(false)) => previous * multiplier,
        (StakeOverlay::Dalembert, Some(true)) => (previous - unit).max(unit),
        (StakeOverlay::Dalembert, Some(false)) => previous + unit,
    }
}

/// Clamp to [MIN_STAKE, max(MIN_STAKE, min(balance x 10%, MAX_STAKE))]
pub fn clamp_stake(stake: f64, balance: f64) -> f64 {
    let upper = (balance * MAX_BALANCE_FRACTION).min(MAX_STAKE).max(MIN_STAKE);
    if !stake.is_finite() {
        return MIN_STAKE;
    }
    stake.clamp(MIN_STAKE, upper)
}
