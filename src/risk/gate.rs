use chrono::{DateTime, Utc};
use std::fmt;

use super::BlackoutCalendar;
use crate::config::TradeConfig;
use crate::execution::SessionState;
use crate::indicators::IndicatorSnapshot;

/// Volatility (%) above which the market counts as spiking
pub const VOLATILITY_SPIKE_PCT: f64 = 3.0;
/// Bollinger width / middle above which bands count as too wide
pub const MAX_BAND_WIDTH_RATIO: f64 = 0.10;

/// What a failed check does to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialEffect {
    /// Session is over until explicitly restarted
    Stop,
    /// Adaptive cooldown is engaged
    Cooldown,
    /// Already paused or stopped; nothing changes
    None,
}

/// Reason a trade attempt was refused, in check order
#[derive(Debug, Clone, PartialEq)]
pub enum Denial {
    Stopped,
    Paused,
    Blackout,
    VolatilitySpike { volatility: f64 },
    MaxTrades { trades: u32 },
    StopLoss { pnl: f64 },
    TakeProfit { pnl: f64 },
    InsufficientBalance { stake: f64, balance: f64 },
    Drawdown { drawdown_pct: f64 },
    ConsecutiveLosses { losses: u32 },
    WideBands { width_ratio: f64 },
}

impl Denial {
    pub fn effect(&self) -> DenialEffect {
        match self {
            Denial::Stopped | Denial::Paused => DenialEffect::None,
            Denial::MaxTrades { .. }
            | Denial::StopLoss { .. }
            | Denial::TakeProfit { .. }
            | Denial::InsufficientBalance { .. } => DenialEffect::Stop,
            Denial::Blackout
            | Denial::VolatilitySpike { .. }
            | Denial::Drawdown { .. }
            | Denial::ConsecutiveLosses { .. }
            | Denial::WideBands { .. } => DenialEffect::Cooldown,
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::Stopped => write!(f, "session stopped"),
            Denial::Paused => write!(f, "cooldown active"),
            Denial::Blackout => write!(f, "news blackout window"),
            Denial::VolatilitySpike { volatility } => {
                write!(f, "volatility spike ({:.2}%)", volatility)
            }
            Denial::MaxTrades { trades } => write!(f, "max trades reached ({})", trades),
            Denial::StopLoss { pnl } => write!(f, "stop loss hit (PnL {:.2})", pnl),
            Denial::TakeProfit { pnl } => write!(f, "take profit hit (PnL {:.2})", pnl),
            Denial::InsufficientBalance { stake, balance } => {
                write!(f, "stake {:.2} exceeds balance {:.2}", stake, balance)
            }
            Denial::Drawdown { drawdown_pct } => write!(f, "drawdown {:.1}%", drawdown_pct),
            Denial::ConsecutiveLosses { losses } => write!(f, "{} consecutive losses", losses),
            Denial::WideBands { width_ratio } => {
                write!(f, "Bollinger width {:.1}% of middle", width_ratio * 100.0)
            }
        }
    }
}

/// Ordered pre-trade checks; the first failing one wins
#[derive(Debug, Clone, Default)]
pub struct TradingGate {
    calendar: BlackoutCalendar,
}

impl TradingGate {
    pub fn new(calendar: BlackoutCalendar) -> Self {
        Self { calendar }
    }

    pub fn in_blackout(&self, now: DateTime<Utc>) -> bool {
        self.calendar.is_active(now)
    }

    /// Run the checks without side effects
    pub fn check(
        &self,
        session: &SessionState,
        config: &TradeConfig,
        indicators: &IndicatorSnapshot,
        stake: f64,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        if session.is_stopped {
            return Err(Denial::Stopped);
        }
        if session.is_paused {
            return Err(Denial::Paused);
        }

        // 1. News blackout or volatility spike
        if self.in_blackout(now) {
            return Err(Denial::Blackout);
        }
        if indicators.volatility > VOLATILITY_SPIKE_PCT {
            return Err(Denial::VolatilitySpike {
                volatility: indicators.volatility,
            });
        }

        // 2. Trade count
        if session.total_trades >= config.max_trades {
            return Err(Denial::MaxTrades {
                trades: session.total_trades,
            });
        }

        // 3. Stop loss
        if config.stop_loss_enabled && session.total_pnl <= -config.max_loss {
            return Err(Denial::StopLoss {
                pnl: session.total_pnl,
            });
        }

        // 4. Take profit
        if config.take_profit_enabled && session.total_pnl >= config.max_profit {
            return Err(Denial::TakeProfit {
                pnl: session.total_pnl,
            });
        }

        // 5. Stake must be covered
        if stake > session.balance {
            return Err(Denial::InsufficientBalance {
                stake,
                balance: session.balance,
            });
        }

        // 6. Drawdown
        let drawdown_pct = session.drawdown_pct();
        if drawdown_pct <= -config.max_drawdown_pct {
            return Err(Denial::Drawdown { drawdown_pct });
        }

        // 7. Losing streak
        if session.consecutive_losses >= config.max_consecutive_losses {
            return Err(Denial::ConsecutiveLosses {
                losses: session.consecutive_losses,
            });
        }

        // 8. Bands too wide
        let width_ratio = indicators.bollinger.width_ratio();
        if width_ratio > MAX_BAND_WIDTH_RATIO {
            return Err(Denial::WideBands { width_ratio });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::Bollinger;
    use crate::risk::BlackoutWindow;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn calm() -> IndicatorSnapshot {
        IndicatorSnapshot {
            volatility: 0.5,
            bollinger: Bollinger {
                upper: 101.0,
                middle: 100.0,
                lower: 99.0,
            },
            candle_count: 30,
            ..IndicatorSnapshot::default()
        }
    }

    #[test]
    fn test_allows_healthy_session() {
        let gate = TradingGate::default();
        let session = SessionState::new(100.0, 1.0);
        assert!(gate
            .check(&session, &TradeConfig::default(), &calm(), 1.0, noon())
            .is_ok());
    }

    #[test]
    fn test_first_violation_in_order_wins() {
        let gate = TradingGate::new(BlackoutCalendar::new(vec![BlackoutWindow::new(12, 0, 10)]));
        let config = TradeConfig {
            max_trades: 1,
            max_loss: 5.0,
            max_consecutive_losses: 2,
            ..TradeConfig::default()
        };
        let mut session = SessionState::new(10.0, 1.0);
        for _ in 0..3 {
            session.record(crate::models::TradeResult::Loss, -3.0);
        }
        let mut wild = calm();
        wild.volatility = 5.0;
        wild.bollinger.upper = 120.0;

        // Blackout, spike, max trades, stop loss, stake, drawdown, streak, bands all fail
        assert_eq!(
            gate.check(&session, &config, &wild, 50.0, noon()),
            Err(Denial::Blackout)
        );

        let gate = TradingGate::default();
        assert!(matches!(
            gate.check(&session, &config, &wild, 50.0, noon()),
            Err(Denial::VolatilitySpike { .. })
        ));

        wild.volatility = 1.0;
        assert!(matches!(
            gate.check(&session, &config, &wild, 50.0, noon()),
            Err(Denial::MaxTrades { trades: 3 })
        ));

        let config = TradeConfig {
            max_trades: 100,
            ..config
        };
        assert!(matches!(
            gate.check(&session, &config, &wild, 50.0, noon()),
            Err(Denial::StopLoss { .. })
        ));

        let config = TradeConfig {
            stop_loss_enabled: false,
            ..config
        };
        assert!(matches!(
            gate.check(&session, &config, &wild, 50.0, noon()),
            Err(Denial::InsufficientBalance { .. })
        ));

        assert!(matches!(
            gate.check(&session, &config, &wild, 0.5, noon()),
            Err(Denial::Drawdown { .. })
        ));

        let config = TradeConfig {
            max_drawdown_pct: 1000.0,
            ..config
        };
        assert!(matches!(
            gate.check(&session, &config, &wild, 0.5, noon()),
            Err(Denial::ConsecutiveLosses { losses: 3 })
        ));

        let config = TradeConfig {
            max_consecutive_losses: 10,
            ..config
        };
        assert!(matches!(
            gate.check(&session, &config, &wild, 0.5, noon()),
            Err(Denial::WideBands { .. })
        ));
    }

    #[test]
    fn test_take_profit() {
        let gate = TradingGate::default();
        let config = TradeConfig {
            max_profit: 10.0,
            ..TradeConfig::default()
        };
        let mut session = SessionState::new(100.0, 1.0);
        session.record(crate::models::TradeResult::Win, 12.0);

        let denial = gate.check(&session, &config, &calm(), 1.0, noon()).unwrap_err();
        assert!(matches!(denial, Denial::TakeProfit { .. }));
        assert_eq!(denial.effect(), DenialEffect::Stop);
    }

    #[test]
    fn test_paused_session_is_denied_without_effect() {
        let gate = TradingGate::default();
        let mut session = SessionState::new(100.0, 1.0);
        session.is_paused = true;

        let denial = gate
            .check(&session, &TradeConfig::default(), &calm(), 1.0, noon())
            .unwrap_err();
        assert_eq!(denial, Denial::Paused);
        assert_eq!(denial.effect(), DenialEffect::None);
    }
}
