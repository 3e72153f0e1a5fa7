// Technical indicators module
// Implements RSI, MA, EMA, Bollinger, MACD, Stochastic, ADX, OBV and volatility

pub mod adx;
pub mod bollinger;
pub mod correlation;
pub mod engine;
pub mod macd;
pub mod market_analysis;
pub mod moving_average;
pub mod obv;
pub mod rsi;
pub mod stochastic;
pub mod volatility;

pub use adx::calculate_adx;
pub use bollinger::{calculate_bollinger, Bollinger};
pub use correlation::{correlate, pearson, CorrelationTable};
pub use engine::{IndicatorConfig, IndicatorEngine, IndicatorField, IndicatorKind, IndicatorSnapshot};
pub use macd::{calculate_macd, calculate_macd_line_series, Macd};
pub use market_analysis::{classify_trend, higher_timeframe_trend, SIDEWAYS_TOLERANCE};
pub use moving_average::{calculate_ema, calculate_ema_series, calculate_sma, calculate_std_dev};
pub use obv::calculate_obv;
pub use rsi::calculate_rsi;
pub use stochastic::{calculate_stochastic, Stochastic};
pub use volatility::{calculate_sentiment, calculate_volatility, is_volatility_spike};
