use serde::{Deserialize, Serialize};

use crate::models::{TradeRecord, TradeResult};
use crate::strategy::StrategyKind;

/// Complete backtest performance metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    // P&L Metrics
    pub total_pnl: f64,
    pub total_return_pct: f64,
    pub initial_balance: f64,
    pub final_balance: f64,

    // Trade Statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,

    // P&L Distribution
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_stake: f64,
    pub profit_factor: f64, // Total wins / Total losses

    // Risk Metrics
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub longest_losing_streak: u32,

    // Gating
    pub denied_signals: usize,
    pub cooldowns: usize,
    pub stopped_early: bool,

    pub final_strategy: StrategyKind,
    pub trades: Vec<TradeRecord>,
}

/// Counters collected by the runner alongside the trade list
#[derive(Debug, Clone, Copy, Default)]
pub struct RunCounters {
    pub denied_signals: usize,
    pub cooldowns: usize,
    pub stopped_early: bool,
}

impl BacktestMetrics {
    /// Calculate metrics from settled trades, in settlement order
    pub fn from_trades(
        trades: Vec<TradeRecord>,
        initial_balance: f64,
        counters: RunCounters,
        final_strategy: StrategyKind,
    ) -> Self {
        let total_trades = trades.len();
        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let final_balance = initial_balance + total_pnl;
        let total_return_pct = if initial_balance > 0.0 {
            (total_pnl / initial_balance) * 100.0
        } else {
            0.0
        };

        // Win/Loss statistics
        let wins: Vec<f64> = trades
            .iter()
            .filter(|t| t.result == TradeResult::Win)
            .map(|t| t.pnl)
            .collect();
        let losses: Vec<f64> = trades
            .iter()
            .filter(|t| t.result == TradeResult::Loss)
            .map(|t| t.pnl)
            .collect();

        let win_rate = if total_trades > 0 {
            (wins.len() as f64 / total_trades as f64) * 100.0
        } else {
            0.0
        };

        let total_wins: f64 = wins.iter().sum();
        let total_losses: f64 = losses.iter().map(|l| l.abs()).sum();

        let avg_win = mean(&wins);
        let avg_loss = if losses.is_empty() {
            0.0
        } else {
            total_losses / losses.len() as f64
        };

        let largest_win = wins.iter().copied().fold(0.0, f64::max);
        let largest_loss = losses.iter().copied().fold(0.0, f64::min);

        let stakes: Vec<f64> = trades.iter().map(|t| t.stake).collect();

        // Profit factor
        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_pct) = Self::calculate_drawdown(&trades, initial_balance);

        Self {
            total_pnl,
            total_return_pct,
            initial_balance,
            final_balance,
            total_trades,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_stake: mean(&stakes),
            profit_factor,
            max_drawdown,
            max_drawdown_pct,
            longest_losing_streak: Self::longest_losing_streak(&trades),
            denied_signals: counters.denied_signals,
            cooldowns: counters.cooldowns,
            stopped_early: counters.stopped_early,
            final_strategy,
            trades,
        }
    }

    /// Calculate maximum drawdown from trades
    fn calculate_drawdown(trades: &[TradeRecord], initial_value: f64) -> (f64, f64) {
        let mut peak = initial_value;
        let mut max_dd = 0.0;
        let mut max_dd_pct = 0.0;
        let mut current_value = initial_value;

        for trade in trades {
            current_value += trade.pnl;

            if current_value > peak {
                peak = current_value;
            }

            let drawdown = peak - current_value;
            if drawdown > max_dd {
                max_dd = drawdown;
                max_dd_pct = if peak > 0.0 { (drawdown / peak) * 100.0 } else { 0.0 };
            }
        }

        (max_dd, max_dd_pct)
    }

    fn longest_losing_streak(trades: &[TradeRecord]) -> u32 {
        let mut longest = 0;
        let mut current = 0;
        for trade in trades {
            if trade.result == TradeResult::Loss {
                current += 1;
                longest = longest.max(current);
            } else {
                current = 0;
            }
        }
        longest
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              BACKTEST PERFORMANCE REPORT              ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("💰 P&L:");
        println!("   Initial Balance:   {:>12.2}", self.initial_balance);
        println!("   Final Balance:     {:>12.2}", self.final_balance);
        println!("   Total P&L:         {:>12.2} ({:+.2}%)", self.total_pnl, self.total_return_pct);

        println!("\n📊 Trades:");
        println!("   Total:             {:>12}", self.total_trades);
        println!("   Wins / Losses:     {:>6} / {:<6}", self.winning_trades, self.losing_trades);
        println!("   Win Rate:          {:>11.1}%", self.win_rate);
        println!("   Avg Win:           {:>12.2}", self.avg_win);
        println!("   Avg Loss:          {:>12.2}", self.avg_loss);
        println!("   Largest Win:       {:>12.2}", self.largest_win);
        println!("   Largest Loss:      {:>12.2}", self.largest_loss);
        println!("   Avg Stake:         {:>12.2}", self.avg_stake);
        println!("   Profit Factor:     {:>12.2}", self.profit_factor);

        println!("\n⚠️  Risk:");
        println!(
            "   Max Drawdown:      {:>12.2} ({:.2}%)",
            self.max_drawdown, self.max_drawdown_pct
        );
        println!("   Losing Streak:     {:>12}", self.longest_losing_streak);
        println!("   Denied Signals:    {:>12}", self.denied_signals);
        println!("   Cooldowns:         {:>12}", self.cooldowns);
        if self.stopped_early {
            println!("   🛑 Session stopped by risk limits");
        }
        println!("   Final Strategy:    {:>12}", self.final_strategy);

        println!("\n═══════════════════════════════════════════════════════\n");
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
