//! Configuration structures for the flowtrader system.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the trading system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Instrument configuration.
    pub instrument: InstrumentConfig,
    /// Ingress validation configuration.
    pub ingress: IngressConfig,
    /// Session / regime configuration.
    pub session: SessionConfig,
    /// VWAP configuration.
    pub vwap: VwapConfig,
    /// Volume profile / composite configuration.
    pub profile: ProfileConfig,
    /// Signal detector configuration.
    pub signal: SignalConfig,
    /// Setup recognizer configuration.
    pub setup: SetupConfig,
    /// Decision engine configuration.
    pub decision: DecisionConfig,
    /// Safety gate configuration.
    pub safety: SafetyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instrument: InstrumentConfig::default(),
            ingress: IngressConfig::default(),
            session: SessionConfig::default(),
            vwap: VwapConfig::default(),
            profile: ProfileConfig::default(),
            signal: SignalConfig::default(),
            setup: SetupConfig::default(),
            decision: DecisionConfig::default(),
            safety: SafetyConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.instrument.tick_size <= 0.0 {
            return Err(Error::config("tick_size must be positive"));
        }
        if self.ingress.price_min >= self.ingress.price_max {
            return Err(Error::config("ingress price band is empty"));
        }
        if !(0.0..=1.0).contains(&self.profile.value_area_fraction) {
            return Err(Error::config("value_area_fraction must be in [0, 1]"));
        }
        if self.profile.composite_days == 0 {
            return Err(Error::config("composite_days must be at least 1"));
        }
        if self.signal.stacked_min_levels < 2 {
            return Err(Error::config("stacked_min_levels must be at least 2"));
        }
        Ok(())
    }
}

/// Instrument-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Trading symbol (e.g. "ES").
    pub symbol: String,
    /// IANA timezone of the exchange (e.g. "America/Chicago").
    pub exchange_timezone: String,
    /// Tick size (minimum price increment).
    pub tick_size: f64,
    /// Dollar value of one point of price movement per contract.
    pub point_value: f64,
    /// Candle bucket duration in seconds.
    pub candle_duration_secs: u32,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            symbol: "ES".to_string(),
            exchange_timezone: "America/Chicago".to_string(),
            tick_size: 0.25,
            point_value: 50.0,
            candle_duration_secs: 60,
        }
    }
}

/// Ingress validation configuration.
///
/// The price band is instrument-specific and must be overridden per
/// deployment; the defaults bracket a generous ES range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressConfig {
    /// Lowest price accepted at ingress.
    pub price_min: f64,
    /// Highest price accepted at ingress.
    pub price_max: f64,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            price_min: 1000.0,
            price_max: 20000.0,
        }
    }
}

/// Session boundary and regime configuration.
///
/// Times are exchange-local wall clock in "HH:MM" form; regular hours
/// apply on weekdays only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Regular session open (exchange-local).
    pub regular_open: String,
    /// Regular session close (exchange-local).
    pub regular_close: String,
    /// Cumulative-delta threshold for a directional regime in regular hours.
    pub regular_delta_threshold: f64,
    /// Threshold for extended hours; tighter, liquidity is thinner.
    pub extended_delta_threshold: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            regular_open: "08:30".to_string(),
            regular_close: "15:00".to_string(),
            regular_delta_threshold: 1500.0,
            extended_delta_threshold: 500.0,
        }
    }
}

/// VWAP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VwapConfig {
    /// Closed candles in the lookback window.
    pub lookback_bars: usize,
}

impl Default for VwapConfig {
    fn default() -> Self {
        Self { lookback_bars: 50 }
    }
}

/// Volume profile and composite configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Target value-area coverage (0.70 for 70%).
    pub value_area_fraction: f64,
    /// Daily profiles merged into the composite.
    pub composite_days: usize,
    /// Value-area overlap at or above which migration is neutral.
    pub migration_overlap_threshold: f64,
    /// Tick tolerance when clustering archived levels.
    pub stack_tolerance_ticks: u32,
    /// Occurrence count at which stacked-level strength saturates.
    pub stack_strength_cap: u32,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            value_area_fraction: 0.70,
            composite_days: 5,
            migration_overlap_threshold: 0.5,
            stack_tolerance_ticks: 8,
            stack_strength_cap: 4,
        }
    }
}

/// Signal detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Bars in each detector's rolling window.
    pub window_bars: usize,
    /// Retention age for actionable signals (seconds).
    pub retention_secs: u32,
    /// Minimum delta divergence (percent) for an actionable divergence.
    pub min_divergence_pct: f64,
    /// Dominant/dominated volume ratio for an imbalanced level.
    pub imbalance_ratio: f64,
    /// Consecutive imbalanced levels required for a stacked signal.
    pub stacked_min_levels: u32,
    /// Volume multiple of the local average marking a trapped extreme.
    pub trapped_volume_mult: f64,
    /// Minimum reversion (percent) confirming trapped participants.
    pub trapped_reversal_pct: f64,
    /// Bars of lookback for trapped-participant reversion.
    pub trapped_lookback_bars: usize,
    /// Consecutive outside-value bars required for initiative.
    pub initiative_min_bars: usize,
    /// Fractional volume/delta decline flagging exhaustion.
    pub exhaustion_decline_frac: f64,
    /// Volume multiple of the local average marking absorption.
    pub absorption_volume_mult: f64,
    /// Maximum bar range (fraction of average range) for absorption.
    pub absorption_max_range_frac: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            window_bars: 20,
            retention_secs: 3600,
            min_divergence_pct: 10.0,
            imbalance_ratio: 2.0,
            stacked_min_levels: 3,
            trapped_volume_mult: 1.5,
            trapped_reversal_pct: 0.15,
            trapped_lookback_bars: 10,
            initiative_min_bars: 3,
            exhaustion_decline_frac: 0.30,
            absorption_volume_mult: 2.0,
            absorption_max_range_frac: 0.40,
        }
    }
}

/// Setup recognizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Minimum confidence for an emitted recommendation.
    pub min_confidence: f64,
    /// Age limit for recommendations (seconds), independent of invalidation.
    pub max_age_secs: u32,
    /// Tick distance counting as "at" a reference level.
    pub level_tolerance_ticks: u32,
    /// Stop distance beyond the faded/broken level, in ticks.
    pub stop_buffer_ticks: u32,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            min_confidence: 60.0,
            max_age_secs: 1800,
            level_tolerance_ticks: 4,
            stop_buffer_ticks: 8,
        }
    }
}

/// Decision engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Minimum recommendation confidence to act on.
    pub min_confidence: f64,
    /// Contracts per entry.
    pub order_quantity: u32,
    /// Absolute book-imbalance flip that forces an exit.
    pub book_flip_threshold: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 70.0,
            order_quantity: 1,
            book_flip_threshold: 0.60,
        }
    }
}

/// Safety gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Shared secret authorizing control-plane mutations. The gate
    /// refuses to start when empty.
    pub auth_key: String,
    /// Unconfirmed orders older than this are expired (seconds).
    pub order_expiry_secs: u32,
    /// Heartbeat age activating the connectivity fence (seconds).
    pub heartbeat_timeout_secs: u32,
    /// Cooldown after a broker reject (seconds).
    pub reject_cooldown_secs: u32,
    /// Daily drawdown (positive number) tripping the circuit breaker.
    pub max_daily_drawdown: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            auth_key: String::new(),
            order_expiry_secs: 60,
            heartbeat_timeout_secs: 30,
            reject_cooldown_secs: 300,
            max_daily_drawdown: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.profile.value_area_fraction, 0.70);
        assert_eq!(config.signal.stacked_min_levels, 3);
        assert_eq!(config.instrument.tick_size, 0.25);
    }

    #[test]
    fn test_empty_price_band_rejected() {
        let mut config = Config::default();
        config.ingress.price_min = 5000.0;
        config.ingress.price_max = 4000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_str() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed = Config::from_json_str(&json).unwrap();
        assert_eq!(parsed.instrument.symbol, "ES");
        assert_eq!(parsed.safety.order_expiry_secs, 60);
    }

    #[test]
    fn test_stacked_min_levels_floor() {
        let mut config = Config::default();
        config.signal.stacked_min_levels = 1;
        assert!(config.validate().is_err());
    }
}
