use super::StrategyKind;
use crate::execution::TradeHistory;

/// Dynamic strategy switching based on historical win rate
#[derive(Debug, Clone)]
pub struct StrategySelector {
    current: StrategyKind,
    /// Trades a strategy needs before it is considered
    pub min_trades: usize,
    /// Best win rate must exceed this to switch
    pub min_win_rate: f64,
}

impl StrategySelector {
    pub fn new(initial: StrategyKind) -> Self {
        Self {
            current: initial,
            min_trades: 10,
            min_win_rate: 0.40,
        }
    }

    pub fn current(&self) -> StrategyKind {
        self.current
    }

    /// Re-rank strategies and switch when a better one qualifies
    ///
    /// Returns the new strategy when a switch happened. Ties are resolved in
    /// favour of the current strategy.
    pub fn reselect(&mut self, history: &TradeHistory) -> Option<StrategyKind> {
        let mut best: Option<(StrategyKind, f64)> = None;

        for (kind, stats) in history.per_strategy() {
            if stats.trades < self.min_trades {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_kind, best_rate)) => {
                    stats.win_rate > best_rate
                        || (stats.win_rate == best_rate && kind == self.current && best_kind != self.current)
                }
            };
            if better {
                best = Some((kind, stats.win_rate));
            }
        }

        let (kind, rate) = best?;
        if kind == self.current || rate <= self.min_win_rate {
            return None;
        }

        tracing::info!(
            "Switching strategy {} -> {} (win rate {:.1}%)",
            self.current,
            kind,
            rate * 100.0
        );
        self.current = kind;
        Some(kind)
    }
}
