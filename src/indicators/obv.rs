use crate::models::Candle;

/// On-Balance Volume: running sum of volume signed by the close-to-close move
pub fn calculate_obv(candles: &[Candle]) -> f64 {
    candles.windows(2).fold(0.0, |obv, pair| {
        let (prev, curr) = (&pair[0], &pair[1]);
        if curr.close > prev.close {
            obv + curr.volume
        } else if curr.close < prev.close {
            obv - curr.volume
        } else {
            obv
        }
    })
}
