use super::{Strategy, StrategyContext};
use crate::indicators::IndicatorSnapshot;
use crate::models::{Direction, Signal, TradeRecord};

/// Records needed before the scorer produces signals
pub const MIN_TRAINING_RECORDS: usize = 20;

const FEATURE_COUNT: usize = 6;

/// Pluggable confidence model behind the scored strategy
pub trait Scorer: Send + Sync {
    /// Refit from settled trades (oldest first)
    fn train(&mut self, history: &[TradeRecord]);

    fn is_trained(&self) -> bool;

    /// Direction and confidence in [0, 1]; None until trained
    fn score(&self, indicators: &IndicatorSnapshot) -> Option<(Direction, f64)>;
}

fn features(ind: &IndicatorSnapshot) -> [f64; FEATURE_COUNT] {
    let ma_distance = if ind.moving_average > 0.0 {
        (ind.last_close - ind.moving_average) / ind.moving_average * 100.0
    } else {
        0.0
    };
    [
        ind.rsi,
        ind.macd.histogram,
        ind.stochastic.k,
        ind.adx,
        ind.volatility,
        ind.sentiment + ma_distance,
    ]
}

/// Weighted sum of indicator z-scores
///
/// Each weight is the mean of `z * outcome` over the training set, where the
/// outcome is +1 when the market moved up during the trade (a CALL won or a
/// PUT lost) and -1 otherwise. Confidence is `tanh(|score|)`.
#[derive(Debug, Clone, Default)]
pub struct WinRateScorer {
    mean: [f64; FEATURE_COUNT],
    std_dev: [f64; FEATURE_COUNT],
    weights: [f64; FEATURE_COUNT],
    trained_on: usize,
}

impl WinRateScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn z_scores(&self, ind: &IndicatorSnapshot) -> [f64; FEATURE_COUNT] {
        let raw = features(ind);
        let mut z = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            if self.std_dev[i] > 0.0 {
                z[i] = (raw[i] - self.mean[i]) / self.std_dev[i];
            }
        }
        z
    }
}

impl Scorer for WinRateScorer {
    fn train(&mut self, history: &[TradeRecord]) {
        if history.len() < MIN_TRAINING_RECORDS {
            self.trained_on = 0;
            return;
        }

        let n = history.len() as f64;
        let rows: Vec<[f64; FEATURE_COUNT]> = history
            .iter()
            .map(|r| features(&r.indicators_at_entry))
            .collect();

        let mut mean = [0.0; FEATURE_COUNT];
        for row in &rows {
            for i in 0..FEATURE_COUNT {
                mean[i] += row[i] / n;
            }
        }

        let mut std_dev = [0.0; FEATURE_COUNT];
        for row in &rows {
            for i in 0..FEATURE_COUNT {
                std_dev[i] += (row[i] - mean[i]).powi(2) / n;
            }
        }
        for s in &mut std_dev {
            *s = s.sqrt();
        }

        self.mean = mean;
        self.std_dev = std_dev;
        self.weights = [0.0; FEATURE_COUNT];

        for record in history {
            let outcome = record.direction.sign() * if record.is_win() { 1.0 } else { -1.0 };
            let z = self.z_scores(&record.indicators_at_entry);
            for i in 0..FEATURE_COUNT {
                self.weights[i] += z[i] * outcome / n;
            }
        }

        self.trained_on = history.len();
        tracing::info!(
            "Scorer trained on {} trades, weights {:?}",
            self.trained_on,
            self.weights
        );
    }

    fn is_trained(&self) -> bool {
        self.trained_on >= MIN_TRAINING_RECORDS
    }

    fn score(&self, indicators: &IndicatorSnapshot) -> Option<(Direction, f64)> {
        if !self.is_trained() {
            return None;
        }

        let z = self.z_scores(indicators);
        let score: f64 = z.iter().zip(self.weights.iter()).map(|(z, w)| z * w).sum();
        if !score.is_finite() {
            return None;
        }

        let direction = if score >= 0.0 {
            Direction::Call
        } else {
            Direction::Put
        };
        Some((direction, score.abs().tanh()))
    }
}

/// Strategy backed by a trained [`Scorer`]
pub struct ScoredStrategy {
    scorer: Box<dyn Scorer>,
    min_confidence: f64,
}

impl ScoredStrategy {
    pub fn new(scorer: Box<dyn Scorer>, min_confidence: f64) -> Self {
        Self {
            scorer,
            min_confidence,
        }
    }

    pub fn retrain(&mut self, history: &[TradeRecord]) {
        self.scorer.train(history);
    }

    pub fn is_trained(&self) -> bool {
        self.scorer.is_trained()
    }
}

impl Default for ScoredStrategy {
    fn default() -> Self {
        Self::new(Box::new(WinRateScorer::new()), 0.55)
    }
}

impl Strategy for ScoredStrategy {
    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signal {
        let Some((direction, confidence)) = self.scorer.score(ctx.indicators) else {
            return Signal::no_trade(format!(
                "Scorer not trained (needs {} trades)",
                MIN_TRAINING_RECORDS
            ));
        };

        if confidence < self.min_confidence {
            return Signal::no_trade(format!(
                "Score confidence {:.2} below {:.2}",
                confidence, self.min_confidence
            ));
        }

        Signal::trade(
            direction,
            confidence,
            format!("Scored model {:.2}", confidence),
        )
    }

    fn name(&self) -> &str {
        "ScoredStrategy"
    }

    fn min_candles_required(&self) -> usize {
        20
    }
}
