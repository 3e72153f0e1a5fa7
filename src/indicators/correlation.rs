use std::collections::{BTreeMap, HashMap};

use crate::models::Candle;

/// Pearson correlation between each unordered pair of symbols
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationTable {
    pairs: BTreeMap<(String, String), f64>,
}

impl CorrelationTable {
    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    pub fn insert(&mut self, a: &str, b: &str, coefficient: f64) {
        self.pairs.insert(Self::key(a, b), coefficient);
    }

    /// Coefficient for the pair in either order
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        self.pairs.get(&Self::key(a, b)).copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &f64)> {
        self.pairs.iter()
    }
}

/// Pearson correlation coefficient of two equally long series (0 on zero variance)
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }

    let (a, b) = (&a[a.len() - n..], &b[b.len() - n..]);
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut covariance = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        covariance += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denominator = (var_a * var_b).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }

    covariance / denominator
}

/// Correlate the trailing `lookback` closes of every symbol pair
///
/// Pairs where either series is shorter than `lookback` are omitted.
pub fn correlate(candles_by_symbol: &HashMap<String, Vec<Candle>>, lookback: usize) -> CorrelationTable {
    let mut table = CorrelationTable::default();

    let mut symbols: Vec<&String> = candles_by_symbol
        .iter()
        .filter(|(_, candles)| lookback > 0 && candles.len() >= lookback)
        .map(|(symbol, _)| symbol)
        .collect();
    symbols.sort();

    let closes: HashMap<&String, Vec<f64>> = symbols
        .iter()
        .map(|symbol| {
            let candles = &candles_by_symbol[*symbol];
            let tail = &candles[candles.len() - lookback..];
            (*symbol, tail.iter().map(|c| c.close).collect())
        })
        .collect();

    for (i, a) in symbols.iter().enumerate() {
        for b in &symbols[i + 1..] {
            table.insert(a, b, pearson(&closes[*a], &closes[*b]));
        }
    }

    table
}
