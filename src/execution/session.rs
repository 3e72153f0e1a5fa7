use serde::{Deserialize, Serialize};

use crate::models::TradeResult;

/// Session counters, mutated only by the trade controller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub balance: f64,
    pub total_trades: u32,
    pub wins: u32,
    pub losses: u32,
    /// Positive for a run of wins, negative for a run of losses
    pub current_streak: i32,
    pub total_pnl: f64,
    pub current_stake: f64,
    pub consecutive_losses: u32,
    pub is_paused: bool,
    pub pause_extensions: u32,
    pub is_stopped: bool,
    pub last_result: Option<TradeResult>,
}

impl SessionState {
    pub fn new(balance: f64, initial_stake: f64) -> Self {
        Self {
            balance,
            total_trades: 0,
            wins: 0,
            losses: 0,
            current_streak: 0,
            total_pnl: 0.0,
            current_stake: initial_stake,
            consecutive_losses: 0,
            is_paused: false,
            pause_extensions: 0,
            is_stopped: false,
            last_result: None,
        }
    }

    /// Apply a settled trade
    pub fn record(&mut self, result: TradeResult, pnl: f64) {
        self.total_trades += 1;
        self.total_pnl += pnl;
        self.balance += pnl;
        self.last_result = Some(result);

        match result {
            TradeResult::Win => {
                self.wins += 1;
                self.consecutive_losses = 0;
                self.pause_extensions = 0;
                self.current_streak = self.current_streak.max(0) + 1;
            }
            TradeResult::Loss => {
                self.losses += 1;
                self.consecutive_losses += 1;
                self.current_streak = self.current_streak.min(0) - 1;
            }
        }
    }

    /// Session PnL as a percentage of the current balance (negative when losing)
    pub fn drawdown_pct(&self) -> f64 {
        if self.balance > 0.0 {
            self.total_pnl / self.balance * 100.0
        } else if self.total_pnl < 0.0 {
            -100.0
        } else {
            0.0
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.total_trades as f64
        }
    }

    /// Start a fresh session on the current balance
    pub fn reset(&mut self, initial_stake: f64) {
        *self = Self::new(self.balance, initial_stake);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_updates_counters() {
        let mut session = SessionState::new(100.0, 1.0);
        session.record(TradeResult::Loss, -1.0);
        session.record(TradeResult::Loss, -1.0);

        assert_eq!(session.total_trades, 2);
        assert_eq!(session.consecutive_losses, 2);
        assert_eq!(session.current_streak, -2);
        assert_eq!(session.balance, 98.0);

        session.record(TradeResult::Win, 0.9);
        assert_eq!(session.consecutive_losses, 0);
        assert_eq!(session.current_streak, 1);
        assert!((session.total_pnl + 1.1).abs() < 1e-12);
        assert_eq!(session.last_result, Some(TradeResult::Win));
    }

    #[test]
    fn test_drawdown_pct() {
        let mut session = SessionState::new(100.0, 1.0);
        session.record(TradeResult::Loss, -20.0);
        assert!((session.drawdown_pct() + 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset_keeps_balance() {
        let mut session = SessionState::new(100.0, 1.0);
        session.record(TradeResult::Win, 5.0);
        session.is_stopped = true;
        session.reset(1.0);

        assert_eq!(session.balance, 105.0);
        assert_eq!(session.total_trades, 0);
        assert!(!session.is_stopped);
    }
}
