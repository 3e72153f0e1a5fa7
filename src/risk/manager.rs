use chrono::{DateTime, Utc};
use std::time::Duration;

use super::sizing::{apply_overlay, base_stake, clamp_stake, SizingInput, MIN_STAKE};
use super::{AdaptiveCooldown, BlackoutCalendar, CooldownOutcome, Denial, DenialEffect, TradingGate};
use crate::config::TradeConfig;
use crate::execution::history::TradeStats;
use crate::execution::SessionState;
use crate::indicators::{IndicatorKind, IndicatorSnapshot};
use crate::models::{MarketConditions, TradeResult};

/// Pre-trade gating, adaptive cooldown and stake sizing
#[derive(Debug, Clone)]
pub struct RiskManager {
    gate: TradingGate,
    cooldown: AdaptiveCooldown,
}

impl RiskManager {
    pub fn new(config: &TradeConfig) -> Self {
        Self {
            gate: TradingGate::new(BlackoutCalendar::new(config.blackouts.clone())),
            cooldown: AdaptiveCooldown::new(Duration::from_millis(config.cooldown_ms)),
        }
    }

    pub fn cooldown_period(&self) -> Duration {
        self.cooldown.period()
    }

    pub fn in_blackout(&self, now: DateTime<Utc>) -> bool {
        self.gate.in_blackout(now)
    }

    /// Run the ordered checks for an attempt at `stake`
    ///
    /// A stop-kind denial stops the session; a cooldown-kind denial pauses
    /// it. Denials while already paused or stopped change nothing.
    pub fn can_trade(
        &self,
        session: &mut SessionState,
        config: &TradeConfig,
        indicators: &IndicatorSnapshot,
        stake: f64,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        let denial = match self.gate.check(session, config, indicators, stake, now) {
            Ok(()) => return Ok(()),
            Err(denial) => denial,
        };

        match denial.effect() {
            DenialEffect::Stop => {
                session.is_stopped = true;
                tracing::warn!("🛑 Session stopped: {}", denial);
            }
            DenialEffect::Cooldown => {
                self.cooldown.engage(session, &denial.to_string());
            }
            DenialEffect::None => {
                tracing::debug!("Trade denied: {}", denial);
            }
        }

        Err(denial)
    }

    /// Timed re-check of a paused session
    pub fn recheck_cooldown(
        &self,
        session: &mut SessionState,
        conditions: &MarketConditions,
    ) -> CooldownOutcome {
        self.cooldown.recheck(session, conditions)
    }

    /// Stake for the next attempt, clamped to the venue/bankroll bounds
    pub fn size_stake(
        &self,
        session: &SessionState,
        config: &TradeConfig,
        last_result: Option<TradeResult>,
        indicators: &IndicatorSnapshot,
        stats: &TradeStats,
    ) -> f64 {
        let volatility = if indicators.is_available(IndicatorKind::Volatility) {
            indicators.volatility
        } else {
            0.0
        };

        let base = base_stake(
            config.stake_policy,
            &SizingInput {
                balance: session.balance,
                initial_stake: config.initial_stake,
                fixed_fraction: config.fixed_fraction,
                volatility,
                drawdown_pct: session.drawdown_pct(),
                stats: *stats,
            },
        );

        let stake = apply_overlay(
            config.stake_overlay,
            base,
            session.current_stake,
            last_result.map(|r| r == TradeResult::Win),
            config.martingale_multiplier,
            config.initial_stake.max(MIN_STAKE),
        );

        let clamped = clamp_stake(stake, session.balance);
        tracing::debug!(
            "Stake sized: base {:.2}, overlay {:.2}, clamped {:.2}",
            base,
            stake,
            clamped
        );
        clamped
    }
}
