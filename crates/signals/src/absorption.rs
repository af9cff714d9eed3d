//! Absorption: heavy aggression that cannot move price.
//!
//! A bar carrying well-above-average volume inside an unusually tight
//! range means passive orders are defending the level. The signal
//! opposes the dominant aggressor: heavy selling absorbed at a low is
//! bullish, heavy buying absorbed at a high is bearish.

use crate::score;
use flowtrader_core::{
    Candle, Direction, OrderFlowSignal, SignalConfig, SignalKind, TimestampMs,
};
use statrs::statistics::Statistics;

/// Detect absorption on the most recent closed bar.
pub fn detect(
    candles: &[Candle],
    config: &SignalConfig,
    now: TimestampMs,
) -> Option<OrderFlowSignal> {
    let start = candles.len().saturating_sub(config.window_bars);
    let window = &candles[start..];
    if window.len() < 4 {
        return None;
    }

    let last = window.last()?;
    let body = &window[..window.len() - 1];

    let avg_volume = body.iter().map(|c| c.volume).collect::<Vec<_>>().mean();
    let avg_range = body.iter().map(|c| c.range()).collect::<Vec<_>>().mean();
    if avg_volume <= 0.0 || avg_range <= 0.0 {
        return None;
    }

    let volume_ratio = last.volume / avg_volume;
    let range_ratio = last.range() / avg_range;

    if volume_ratio < config.absorption_volume_mult
        || range_ratio > config.absorption_max_range_frac
    {
        return None;
    }

    // Aggression with no progress: fade the aggressor.
    let direction = if last.delta < 0.0 {
        Direction::Bullish
    } else if last.delta > 0.0 {
        Direction::Bearish
    } else {
        return None;
    };

    let tightness = 1.0 - (range_ratio / config.absorption_max_range_frac).min(1.0);
    Some(OrderFlowSignal {
        kind: SignalKind::Absorption,
        direction,
        strength: score(30.0 * volume_ratio + 30.0 * tightness),
        confidence: score(50.0 + 15.0 * (volume_ratio - config.absorption_volume_mult) + 25.0 * tightness),
        actionable: true,
        ts_ms: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(i: i64, high: f64, low: f64, volume: f64, delta: f64) -> Candle {
        Candle {
            ts_open: i * 60_000,
            duration_ms: 60_000,
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
            volume,
            buy_volume: (volume + delta) / 2.0,
            sell_volume: (volume - delta) / 2.0,
            delta,
            tick_count: 10,
        }
    }

    fn config() -> SignalConfig {
        SignalConfig::default()
    }

    #[test]
    fn test_sell_absorption_is_bullish() {
        // Normal bars with ~4 point ranges, then a 1-point bar on 3x
        // volume with heavy selling.
        let candles = vec![
            candle(0, 5004.0, 5000.0, 100.0, 10.0),
            candle(1, 5003.0, 4999.0, 110.0, -5.0),
            candle(2, 5004.0, 5000.0, 90.0, 0.0),
            candle(3, 5002.0, 4998.0, 100.0, 10.0),
            candle(4, 5000.5, 4999.5, 300.0, -150.0),
        ];
        let signal = detect(&candles, &config(), 300_000).unwrap();
        assert_eq!(signal.kind, SignalKind::Absorption);
        assert_eq!(signal.direction, Direction::Bullish);
        assert!(signal.actionable);
    }

    #[test]
    fn test_buy_absorption_is_bearish() {
        let candles = vec![
            candle(0, 5004.0, 5000.0, 100.0, 10.0),
            candle(1, 5003.0, 4999.0, 110.0, -5.0),
            candle(2, 5004.0, 5000.0, 90.0, 0.0),
            candle(3, 5002.0, 4998.0, 100.0, 10.0),
            candle(4, 5003.5, 5002.5, 300.0, 150.0),
        ];
        let signal = detect(&candles, &config(), 300_000).unwrap();
        assert_eq!(signal.direction, Direction::Bearish);
    }

    #[test]
    fn test_wide_range_is_not_absorption() {
        // Heavy volume but price travelled: initiative, not absorption.
        let candles = vec![
            candle(0, 5004.0, 5000.0, 100.0, 10.0),
            candle(1, 5003.0, 4999.0, 110.0, -5.0),
            candle(2, 5004.0, 5000.0, 90.0, 0.0),
            candle(3, 5002.0, 4998.0, 100.0, 10.0),
            candle(4, 5008.0, 5000.0, 300.0, 150.0),
        ];
        assert!(detect(&candles, &config(), 300_000).is_none());
    }

    #[test]
    fn test_normal_volume_is_not_absorption() {
        let candles = vec![
            candle(0, 5004.0, 5000.0, 100.0, 10.0),
            candle(1, 5003.0, 4999.0, 110.0, -5.0),
            candle(2, 5004.0, 5000.0, 90.0, 0.0),
            candle(3, 5002.0, 4998.0, 100.0, 10.0),
            candle(4, 5000.5, 4999.5, 105.0, -50.0),
        ];
        assert!(detect(&candles, &config(), 300_000).is_none());
    }

    #[test]
    fn test_short_window_no_signal() {
        let candles = vec![
            candle(0, 5004.0, 5000.0, 100.0, 10.0),
            candle(1, 5000.5, 4999.5, 300.0, -150.0),
        ];
        assert!(detect(&candles, &config(), 120_000).is_none());
    }
}
