// Configuration module
// TOML file + OPTIONBOT__* environment overrides, validated by clamping

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::indicators::IndicatorConfig;
use crate::models::Direction;
use crate::risk::{BlackoutWindow, StakeOverlay, StakePolicy};
use crate::strategy::{CustomRule, StrategyKind};

pub const DEFAULT_SYMBOL: &str = "R_100";
pub const DEFAULT_WS_URL: &str = "wss://ws.derivws.com/websockets/v3?app_id=1089";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
}

/// A field that was out of range and has been clamped
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// User-level trading configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TradeConfig {
    pub strategy: StrategyKind,
    pub symbols: Vec<String>,
    pub default_direction: Direction,
    pub duration_secs: u64,
    pub currency: String,

    // Session limits
    pub stop_loss_enabled: bool,
    pub max_loss: f64,
    pub take_profit_enabled: bool,
    pub max_profit: f64,
    pub max_trades: u32,
    pub max_drawdown_pct: f64,
    pub max_consecutive_losses: u32,
    pub cooldown_ms: u64,
    pub blackouts: Vec<BlackoutWindow>,

    // Stake sizing
    pub stake_policy: StakePolicy,
    pub stake_overlay: StakeOverlay,
    pub initial_stake: f64,
    pub fixed_fraction: f64,
    pub martingale_multiplier: f64,

    // Signal generation
    pub custom_rules: Vec<CustomRule>,
    pub multi_timeframe: bool,
    pub dynamic_switching: bool,
    pub use_candle_patterns: bool,
    pub min_confidence: f64,
    pub min_trade_interval_secs: u64,
    pub early_exit_enabled: bool,
    pub early_exit_profit_ratio: f64,

    // Market data
    pub candle_timeframe_secs: u64,
    pub candle_capacity: usize,
    pub indicators: IndicatorConfig,
    pub history_capacity: usize,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::RsiThreshold,
            symbols: vec![DEFAULT_SYMBOL.to_string()],
            default_direction: Direction::Call,
            duration_secs: 60,
            currency: "USD".to_string(),
            stop_loss_enabled: true,
            max_loss: 50.0,
            take_profit_enabled: true,
            max_profit: 100.0,
            max_trades: 50,
            max_drawdown_pct: 20.0,
            max_consecutive_losses: 5,
            cooldown_ms: 300_000,
            blackouts: Vec::new(),
            stake_policy: StakePolicy::Fixed,
            stake_overlay: StakeOverlay::None,
            initial_stake: 1.0,
            fixed_fraction: 0.01,
            martingale_multiplier: 2.0,
            custom_rules: Vec::new(),
            multi_timeframe: false,
            dynamic_switching: false,
            use_candle_patterns: false,
            min_confidence: 0.55,
            min_trade_interval_secs: 10,
            early_exit_enabled: false,
            early_exit_profit_ratio: 0.5,
            candle_timeframe_secs: 60,
            candle_capacity: 500,
            indicators: IndicatorConfig::default(),
            history_capacity: 1000,
        }
    }
}

impl TradeConfig {
    /// Clamp every out-of-range field to its nearest valid bound
    ///
    /// Returns one warning per adjusted field (each also logged).
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        self.symbols.retain(|s| !s.trim().is_empty());
        if self.symbols.is_empty() {
            self.symbols.push(DEFAULT_SYMBOL.to_string());
            warnings.push(ConfigWarning {
                field: "symbols",
                message: format!("no symbols configured, using {}", DEFAULT_SYMBOL),
            });
        }

        clamp_min(&mut self.duration_secs, 1, "duration_secs", &mut warnings);
        clamp_min(&mut self.max_trades, 1, "max_trades", &mut warnings);
        clamp_min(&mut self.max_consecutive_losses, 1, "max_consecutive_losses", &mut warnings);
        clamp_min(&mut self.cooldown_ms, 1000, "cooldown_ms", &mut warnings);
        clamp_min(&mut self.candle_timeframe_secs, 1, "candle_timeframe_secs", &mut warnings);
        clamp_min(&mut self.history_capacity, 1, "history_capacity", &mut warnings);

        clamp_f64(&mut self.max_loss, 0.0, f64::MAX, "max_loss", &mut warnings);
        clamp_f64(&mut self.max_profit, 0.0, f64::MAX, "max_profit", &mut warnings);
        clamp_f64(&mut self.max_drawdown_pct, 0.0, f64::MAX, "max_drawdown_pct", &mut warnings);
        clamp_f64(&mut self.martingale_multiplier, 1.0, f64::MAX, "martingale_multiplier", &mut warnings);
        clamp_f64(&mut self.fixed_fraction, 0.0, 1.0, "fixed_fraction", &mut warnings);
        clamp_f64(&mut self.initial_stake, 0.0, f64::MAX, "initial_stake", &mut warnings);
        clamp_f64(&mut self.min_confidence, 0.0, 1.0, "min_confidence", &mut warnings);
        clamp_f64(&mut self.early_exit_profit_ratio, 0.0, f64::MAX, "early_exit_profit_ratio", &mut warnings);

        let capacity = self
            .candle_capacity
            .clamp(crate::market::MIN_CAPACITY, crate::market::MAX_CAPACITY);
        if capacity != self.candle_capacity {
            warnings.push(ConfigWarning {
                field: "candle_capacity",
                message: format!("{} out of range, using {}", self.candle_capacity, capacity),
            });
            self.candle_capacity = capacity;
        }

        let ind = &mut self.indicators;
        clamp_min(&mut ind.rsi_period, 2, "indicators.rsi_period", &mut warnings);
        clamp_min(&mut ind.ma_period, 2, "indicators.ma_period", &mut warnings);
        clamp_min(&mut ind.short_ma_period, 2, "indicators.short_ma_period", &mut warnings);
        clamp_min(&mut ind.macd_fast, 2, "indicators.macd_fast", &mut warnings);
        clamp_min(&mut ind.macd_signal, 2, "indicators.macd_signal", &mut warnings);
        clamp_min(&mut ind.stochastic_period, 2, "indicators.stochastic_period", &mut warnings);
        clamp_min(&mut ind.stochastic_smooth, 1, "indicators.stochastic_smooth", &mut warnings);
        clamp_min(&mut ind.adx_period, 2, "indicators.adx_period", &mut warnings);
        clamp_min(&mut ind.sentiment_window, 1, "indicators.sentiment_window", &mut warnings);
        clamp_min(&mut ind.correlation_lookback, 2, "indicators.correlation_lookback", &mut warnings);
        clamp_min(&mut ind.macd_slow, ind.macd_fast + 1, "indicators.macd_slow", &mut warnings);
        clamp_f64(&mut ind.bollinger_k, 0.0, f64::MAX, "indicators.bollinger_k", &mut warnings);

        for window in &mut self.blackouts {
            if window.hour > 23 || window.minute > 59 {
                window.hour = window.hour.min(23);
                window.minute = window.minute.min(59);
                warnings.push(ConfigWarning {
                    field: "blackouts",
                    message: format!("window clamped to {:02}:{:02}", window.hour, window.minute),
                });
            }
        }

        for warning in &warnings {
            tracing::warn!("Config adjusted - {}", warning);
        }

        warnings
    }
}

fn clamp_min<T>(value: &mut T, min: T, field: &'static str, warnings: &mut Vec<ConfigWarning>)
where
    T: PartialOrd + Copy + fmt::Display,
{
    if *value < min {
        warnings.push(ConfigWarning {
            field,
            message: format!("{} below minimum, using {}", value, min),
        });
        *value = min;
    }
}

fn clamp_f64(value: &mut f64, min: f64, max: f64, field: &'static str, warnings: &mut Vec<ConfigWarning>) {
    let clamped = if value.is_nan() { min } else { value.clamp(min, max) };
    if clamped != *value || value.is_nan() {
        warnings.push(ConfigWarning {
            field,
            message: format!("{} out of range, using {}", value, clamped),
        });
        *value = clamped;
    }
}

/// Venue connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VenueConfig {
    pub ws_url: String,
    #[serde(skip_serializing)]
    pub api_token: String,
    pub reconnect_backoff_secs: u64,
    pub reconnect_max_retries: u32,
    pub outbox_capacity: usize,
    pub requests_per_second: u32,
    pub rate_limit_backoff_ms: u64,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            api_token: String::new(),
            reconnect_backoff_secs: 5,
            reconnect_max_retries: 10,
            outbox_capacity: 256,
            requests_per_second: 5,
            rate_limit_backoff_ms: 2000,
        }
    }
}

impl VenueConfig {
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        clamp_min(&mut self.outbox_capacity, 1, "outbox_capacity", &mut warnings);
        clamp_min(&mut self.requests_per_second, 1, "requests_per_second", &mut warnings);
        clamp_min(&mut self.reconnect_backoff_secs, 1, "reconnect_backoff_secs", &mut warnings);
        for warning in &warnings {
            tracing::warn!("Config adjusted - {}", warning);
        }
        warnings
    }
}

/// Optional storage backends; the in-memory store is used when both are unset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub redis_url: Option<String>,
    pub database_url: Option<String>,
    pub tick_retention: usize,
    pub candle_retention: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub trading: TradeConfig,
    pub venue: VenueConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load from an optional TOML file, then `OPTIONBOT__*` environment overrides
    ///
    /// Venue credentials come only from `VENUE_API_TOKEN` / `VENUE_WS_URL`.
    pub fn load(path: Option<&str>) -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path).required(true));
        } else {
            builder = builder.add_source(::config::File::with_name("optionbot").required(false));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("OPTIONBOT")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("trading.symbols")
                    .try_parsing(true),
            )
            .build()?;

        let mut app: AppConfig = settings.try_deserialize()?;

        if let Ok(token) = std::env::var("VENUE_API_TOKEN") {
            app.venue.api_token = token;
        }
        if let Ok(url) = std::env::var("VENUE_WS_URL") {
            app.venue.ws_url = url;
        }
        if app.storage.redis_url.is_none() {
            app.storage.redis_url = std::env::var("REDIS_URL").ok();
        }
        if app.storage.database_url.is_none() {
            app.storage.database_url = std::env::var("DATABASE_URL").ok();
        }

        let warnings = app.validate();
        Ok((app, warnings))
    }

    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = self.trading.validate();
        warnings.extend(self.venue.validate());
        if self.storage.tick_retention == 0 {
            self.storage.tick_retention = 10_000;
        }
        if self.storage.candle_retention == 0 {
            self.storage.candle_retention = self.trading.candle_capacity;
        }
        warnings
    }

    /// Fail when the venue token is missing (live mode only)
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        if self.venue.api_token.is_empty() {
            Err(ConfigError::MissingEnv("VENUE_API_TOKEN"))
        } else {
            Ok(&self.venue.api_token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let mut config = TradeConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config, TradeConfig::default());
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let mut config = TradeConfig {
            symbols: vec![" ".to_string()],
            duration_secs: 0,
            max_trades: 0,
            martingale_multiplier: 0.5,
            max_loss: -10.0,
            cooldown_ms: 10,
            fixed_fraction: 1.5,
            candle_capacity: 20,
            min_confidence: f64::NAN,
            ..TradeConfig::default()
        };

        let warnings = config.validate();

        assert_eq!(config.symbols, vec![DEFAULT_SYMBOL.to_string()]);
        assert_eq!(config.duration_secs, 1);
        assert_eq!(config.max_trades, 1);
        assert_eq!(config.martingale_multiplier, 1.0);
        assert_eq!(config.max_loss, 0.0);
        assert_eq!(config.cooldown_ms, 1000);
        assert_eq!(config.fixed_fraction, 1.0);
        assert_eq!(config.candle_capacity, 100);
        assert_eq!(config.min_confidence, 0.0);

        let fields: Vec<&str> = warnings.iter().map(|w| w.field).collect();
        for field in [
            "symbols",
            "duration_secs",
            "max_trades",
            "martingale_multiplier",
            "max_loss",
            "cooldown_ms",
            "fixed_fraction",
            "candle_capacity",
            "min_confidence",
        ] {
            assert!(fields.contains(&field), "missing warning for {}", field);
        }
    }

    #[test]
    fn test_indicator_periods_are_clamped() {
        let mut config = TradeConfig {
            indicators: IndicatorConfig {
                rsi_period: 0,
                macd_fast: 30,
                macd_slow: 26,
                bollinger_k: -1.0,
                ..IndicatorConfig::default()
            },
            ..TradeConfig::default()
        };

        let warnings = config.validate();

        assert_eq!(config.indicators.rsi_period, 2);
        assert_eq!(config.indicators.macd_fast, 30);
        assert_eq!(config.indicators.macd_slow, 31);
        assert_eq!(config.indicators.bollinger_k, 0.0);
        let fields: Vec<&str> = warnings.iter().map(|w| w.field).collect();
        assert!(fields.contains(&"indicators.rsi_period"));
        assert!(fields.contains(&"indicators.macd_slow"));
    }

    #[test]
    fn test_venue_outbox_capacity_at_least_one() {
        let mut venue = VenueConfig {
            outbox_capacity: 0,
            ..VenueConfig::default()
        };
        let warnings = venue.validate();
        assert_eq!(venue.outbox_capacity, 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(
                r#"
                [trading]
                strategy = "trend-follow"
                symbols = ["R_50", "R_75"]
                max_trades = 3
                "#,
                ::config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let app: AppConfig = settings.try_deserialize().unwrap();
        assert_eq!(app.trading.strategy, StrategyKind::TrendFollow);
        assert_eq!(app.trading.symbols, vec!["R_50", "R_75"]);
        assert_eq!(app.trading.max_trades, 3);
        assert_eq!(app.trading.duration_secs, 60);
        assert_eq!(app.venue.outbox_capacity, 256);
    }

    #[test]
    fn test_missing_token_is_reported() {
        let app = AppConfig::default();
        assert!(matches!(
            app.require_token(),
            Err(ConfigError::MissingEnv("VENUE_API_TOKEN"))
        ));
    }
}
