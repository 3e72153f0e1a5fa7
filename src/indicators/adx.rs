/// Average Directional Index (ADX) - Measures trend strength
///
/// ADX ranges from 0 to 100:
/// - ADX > 25: Strong trend (bull or bear)
/// - ADX 20-25: Moderate trend
/// - ADX < 20: Weak trend / choppy / ranging market
///
/// Also returns +DI and -DI to determine trend direction:
/// - +DI > -DI: Uptrend
/// - -DI > +DI: Downtrend

use crate::models::Candle;

/// Calculate ADX, +DI, and -DI using Wilder's formulation
///
/// True range and directional movement sums are seeded with the first
/// `period` changes (or every change available when fewer exist) and then
/// Wilder-smoothed. ADX is the mean of the first `period` DX values,
/// Wilder-smoothed over the rest.
///
/// Returns (adx, plus_di, minus_di) or None if fewer than `period` candles
pub fn calculate_adx(candles: &[Candle], period: usize) -> Option<(f64, f64, f64)> {
    if period < 2 || candles.len() < period {
        return None;
    }

    // Step 1: Calculate True Range (TR) and Directional Movement (+DM, -DM)
    let mut true_ranges = Vec::with_capacity(candles.len() - 1);
    let mut plus_dms = Vec::with_capacity(candles.len() - 1);
    let mut minus_dms = Vec::with_capacity(candles.len() - 1);

    for i in 1..candles.len() {
        let high = candles[i].high;
        let low = candles[i].low;
        let prev_close = candles[i - 1].close;
        let prev_high = candles[i - 1].high;
        let prev_low = candles[i - 1].low;

        // True Range = max(high - low, abs(high - prev_close), abs(low - prev_close))
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        true_ranges.push(tr);

        let up_move = high - prev_high;
        let down_move = prev_low - low;

        plus_dms.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dms.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
    }

    // Step 2: Seed the Wilder sums
    let seed = period.min(true_ranges.len());
    let mut smoothed_tr: f64 = true_ranges[..seed].iter().sum();
    let mut smoothed_plus_dm: f64 = plus_dms[..seed].iter().sum();
    let mut smoothed_minus_dm: f64 = minus_dms[..seed].iter().sum();

    let (mut plus_di, mut minus_di) = directional_indices(smoothed_tr, smoothed_plus_dm, smoothed_minus_dm);
    let mut dx_values = vec![directional_index(plus_di, minus_di)];

    // Step 3: Wilder-smooth the sums over the remaining changes, one DX per bar
    let p = period as f64;
    for i in seed..true_ranges.len() {
        smoothed_tr = smoothed_tr - smoothed_tr / p + true_ranges[i];
        smoothed_plus_dm = smoothed_plus_dm - smoothed_plus_dm / p + plus_dms[i];
        smoothed_minus_dm = smoothed_minus_dm - smoothed_minus_dm / p + minus_dms[i];

        let (pdi, mdi) = directional_indices(smoothed_tr, smoothed_plus_dm, smoothed_minus_dm);
        plus_di = pdi;
        minus_di = mdi;
        dx_values.push(directional_index(plus_di, minus_di));
    }

    // Step 4: ADX = mean of the first `period` DX values, then Wilder-smoothed
    let first = period.min(dx_values.len());
    let mut adx = dx_values[..first].iter().sum::<f64>() / first as f64;
    for dx in &dx_values[first..] {
        adx = (adx * (p - 1.0) + dx) / p;
    }

    Some((adx, plus_di, minus_di))
}

fn directional_indices(smoothed_tr: f64, smoothed_plus_dm: f64, smoothed_minus_dm: f64) -> (f64, f64) {
    if smoothed_tr > 0.0 {
        (
            (smoothed_plus_dm / smoothed_tr) * 100.0,
            (smoothed_minus_dm / smoothed_tr) * 100.0,
        )
    } else {
        (0.0, 0.0)
    }
}

fn directional_index(plus_di: f64, minus_di: f64) -> f64 {
    let di_sum = plus_di + minus_di;
    if di_sum > 0.0 {
        ((plus_di - minus_di).abs() / di_sum) * 100.0
    } else {
        0.0
    }
}
