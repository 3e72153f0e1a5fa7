use chrono::{DateTime, Duration, Timelike, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::backtest::metrics::{BacktestMetrics, RunCounters};
use crate::config::TradeConfig;
use crate::execution::{SessionState, TradeHistory};
use crate::indicators::{classify_trend, IndicatorEngine, IndicatorSnapshot, SIDEWAYS_TOLERANCE};
use crate::market::classify;
use crate::models::{Candle, Direction, MarketConditions, TradeRecord, TradeResult};
use crate::risk::{CooldownOutcome, DenialEffect, RiskManager};
use crate::strategy::{SignalEngine, StrategySelector};
use crate::Result;

/// Fraction of the stake paid on a winning contract
pub const DEFAULT_PAYOUT_RATIO: f64 = 0.85;

/// Replays candles through the live decision pipeline with simulated settlement
///
/// Each contract is opened at a candle close and settled against the close
/// `duration_candles` later: a CALL wins when that close is higher, a PUT
/// when it is lower, and an unchanged price loses.
pub struct BacktestRunner {
    config: TradeConfig,
    initial_balance: f64,
    payout_ratio: f64,
    duration_candles: usize,
}

impl BacktestRunner {
    pub fn new(config: TradeConfig, initial_balance: f64) -> Self {
        let timeframe = config.candle_timeframe_secs.max(1);
        let duration_candles = config.duration_secs.div_ceil(timeframe).max(1) as usize;
        Self {
            config,
            initial_balance,
            payout_ratio: DEFAULT_PAYOUT_RATIO,
            duration_candles,
        }
    }

    pub fn with_payout_ratio(mut self, payout_ratio: f64) -> Self {
        self.payout_ratio = payout_ratio.max(0.0);
        self
    }

    pub fn with_duration_candles(mut self, candles: usize) -> Self {
        self.duration_candles = candles.max(1);
        self
    }

    /// Run a backtest over `candles` (oldest first, one symbol)
    pub fn run(&self, candles: &[Candle]) -> Result<BacktestMetrics> {
        let min_needed = self.duration_candles + 2;
        if candles.len() < min_needed {
            return Err(format!(
                "Not enough candles for backtest. Need {}, got {}",
                min_needed,
                candles.len()
            )
            .into());
        }

        tracing::info!(
            "Starting backtest: {} candles, {} strategy, {}-candle contracts",
            candles.len(),
            self.config.strategy,
            self.duration_candles
        );

        let engine = IndicatorEngine::new(self.config.indicators.clone());
        let mut signals = SignalEngine::new(&self.config);
        let risk = RiskManager::new(&self.config);
        let mut selector = StrategySelector::new(self.config.strategy);
        let mut history = TradeHistory::new(self.config.history_capacity);
        let mut session = SessionState::new(self.initial_balance, self.config.initial_stake);

        let cooldown = Duration::milliseconds(risk.cooldown_period().as_millis() as i64);
        let mut counters = RunCounters::default();
        let mut trades = Vec::new();
        let mut recheck_at: Option<DateTime<Utc>> = None;
        let mut busy_until = 0usize;

        for i in 0..candles.len() - self.duration_candles {
            let candle = &candles[i];
            let now = candle.period_start;

            if session.is_stopped {
                counters.stopped_early = true;
                break;
            }

            // Timed cooldown re-check, on candle time
            if session.is_paused {
                match recheck_at {
                    Some(at) if now >= at => {}
                    _ => continue,
                }
                let snapshot = engine.update(self.window(candles, i));
                let conditions = self.conditions(candles, i, &snapshot, &risk);
                match risk.recheck_cooldown(&mut session, &conditions) {
                    CooldownOutcome::Extended { .. } => {
                        recheck_at = Some(now + cooldown);
                        continue;
                    }
                    _ => recheck_at = None,
                }
            }

            if i < busy_until {
                continue;
            }

            let window = self.window(candles, i);
            let snapshot = engine.update(window);
            let conditions = self.conditions(candles, i, &snapshot, &risk);
            let strategy = selector.current();

            let signal = signals.evaluate(strategy, &snapshot, window, &conditions);
            if !signal.should_trade {
                continue;
            }

            let stake = risk.size_stake(
                &session,
                &self.config,
                session.last_result,
                &snapshot,
                &history.stats(),
            );

            if let Err(denial) = risk.can_trade(&mut session, &self.config, &snapshot, stake, now) {
                counters.denied_signals += 1;
                if denial.effect() == DenialEffect::Cooldown && session.is_paused {
                    counters.cooldowns += 1;
                    recheck_at = Some(now + cooldown);
                }
                continue;
            }

            let exit = &candles[i + self.duration_candles];
            let won = match signal.direction {
                Direction::Call => exit.close > candle.close,
                Direction::Put => exit.close < candle.close,
            };
            let (result, pnl) = if won {
                (TradeResult::Win, stake * self.payout_ratio)
            } else {
                (TradeResult::Loss, -stake)
            };

            let record = TradeRecord {
                id: Uuid::new_v4(),
                contract_id: format!("bt-{}", i),
                symbol: candle.symbol.clone(),
                strategy,
                result,
                pnl,
                stake,
                direction: signal.direction,
                duration_secs: self.config.duration_secs,
                indicators_at_entry: snapshot,
                market_conditions_at_entry: conditions,
                timestamp: exit.period_start,
            };
            tracing::debug!(
                "{} {} @ {:.4} -> {:.4}: {:?} {:+.2}",
                strategy,
                signal.direction,
                candle.close,
                exit.close,
                result,
                pnl
            );

            session.current_stake = stake;
            session.record(result, pnl);
            history.push(record.clone());
            trades.push(record);
            busy_until = i + self.duration_candles;

            signals.retrain(&history.to_vec());
            if self.config.dynamic_switching {
                if let Some(next) = selector.reselect(&history) {
                    tracing::debug!("Switched strategy {} -> {}", strategy, next);
                }
            }
        }

        if session.is_stopped {
            counters.stopped_early = true;
        }

        let metrics = BacktestMetrics::from_trades(trades, self.initial_balance, counters, selector.current());

        tracing::info!(
            "Backtest complete: {} trades, P&L: {:.2} ({:.2}%)",
            metrics.total_trades,
            metrics.total_pnl,
            metrics.total_return_pct
        );

        Ok(metrics)
    }

    /// Run backtest and print report
    pub fn run_and_report(&self, candles: &[Candle], scenario_name: &str) -> Result<BacktestMetrics> {
        println!("\n🔬 Running backtest: {}", scenario_name);
        println!("   Strategy: {}", self.config.strategy);
        println!("   Candles: {}", candles.len());
        println!("   Initial Balance: {:.2}", self.initial_balance);

        let metrics = self.run(candles)?;
        metrics.print_report();

        Ok(metrics)
    }

    /// Candles visible at index `i`, bounded by the aggregator capacity
    fn window<'a>(&self, candles: &'a [Candle], i: usize) -> &'a [Candle] {
        let start = (i + 1).saturating_sub(self.config.candle_capacity.max(1));
        &candles[start..=i]
    }

    fn conditions(
        &self,
        candles: &[Candle],
        i: usize,
        snapshot: &IndicatorSnapshot,
        risk: &RiskManager,
    ) -> MarketConditions {
        let candle = &candles[i];
        let recent = &candles[i.saturating_sub(2)..=i];
        let mut peer_prices = BTreeMap::new();
        peer_prices.insert(candle.symbol.clone(), candle.close);

        MarketConditions {
            trend: classify_trend(
                snapshot.short_moving_average,
                snapshot.moving_average,
                SIDEWAYS_TOLERANCE,
            ),
            volatility: snapshot.volatility,
            adx: snapshot.adx,
            in_blackout: risk.in_blackout(candle.period_start),
            pattern: classify(recent),
            hour: candle.period_start.hour(),
            peer_prices,
        }
    }
}
