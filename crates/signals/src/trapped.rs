//! Trapped participants: a failed breakout on heavy volume.
//!
//! An extreme bar carrying well-above-average volume followed by price
//! reverting away from that extreme leaves the breakout participants
//! offside. Trapped buyers at a high are a bearish signal; trapped
//! sellers at a low are bullish.

use crate::score;
use flowtrader_core::{
    Candle, Direction, OrderFlowSignal, SignalConfig, SignalKind, TimestampMs,
};
use statrs::statistics::Statistics;

/// Detect trapped participants over the trailing lookback.
pub fn detect(
    candles: &[Candle],
    config: &SignalConfig,
    now: TimestampMs,
) -> Option<OrderFlowSignal> {
    let start = candles.len().saturating_sub(config.trapped_lookback_bars);
    let window = &candles[start..];
    if window.len() < 3 {
        return None;
    }

    let avg_volume = window.iter().map(|c| c.volume).collect::<Vec<_>>().mean();
    if avg_volume <= 0.0 {
        return None;
    }
    let last_close = window.last()?.close;

    // Highest high and lowest low in the window, excluding the last bar
    // (the reversion bar itself cannot be the extreme).
    let body = &window[..window.len() - 1];

    let hi_bar = body
        .iter()
        .max_by(|a, b| a.high.partial_cmp(&b.high).unwrap_or(std::cmp::Ordering::Equal))?;
    let lo_bar = body
        .iter()
        .min_by(|a, b| a.low.partial_cmp(&b.low).unwrap_or(std::cmp::Ordering::Equal))?;

    // Trapped buyers: heavy-volume high, price reverted down from it.
    if hi_bar.volume >= config.trapped_volume_mult * avg_volume {
        let reversal_pct = (hi_bar.high - last_close) / hi_bar.high * 100.0;
        if reversal_pct >= config.trapped_reversal_pct {
            return Some(build(
                Direction::Bearish,
                hi_bar.volume / avg_volume,
                reversal_pct,
                config,
                now,
            ));
        }
    }

    // Trapped sellers: heavy-volume low, price reverted up from it.
    if lo_bar.volume >= config.trapped_volume_mult * avg_volume {
        let reversal_pct = (last_close - lo_bar.low) / lo_bar.low * 100.0;
        if reversal_pct >= config.trapped_reversal_pct {
            return Some(build(
                Direction::Bullish,
                lo_bar.volume / avg_volume,
                reversal_pct,
                config,
                now,
            ));
        }
    }

    None
}

fn build(
    direction: Direction,
    volume_mult: f64,
    reversal_pct: f64,
    config: &SignalConfig,
    now: TimestampMs,
) -> OrderFlowSignal {
    OrderFlowSignal {
        kind: SignalKind::TrappedParticipants,
        direction,
        strength: score(25.0 * volume_mult + 30.0 * (reversal_pct / config.trapped_reversal_pct).min(2.0)),
        confidence: score(
            45.0 + 15.0 * (volume_mult - config.trapped_volume_mult).max(0.0)
                + 10.0 * (reversal_pct / config.trapped_reversal_pct).min(2.0),
        ),
        actionable: true,
        ts_ms: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(i: i64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            ts_open: i * 60_000,
            duration_ms: 60_000,
            open: close,
            high,
            low,
            close,
            volume,
            buy_volume: volume / 2.0,
            sell_volume: volume / 2.0,
            delta: 0.0,
            tick_count: 10,
        }
    }

    fn config() -> SignalConfig {
        SignalConfig::default()
    }

    #[test]
    fn test_trapped_buyers_at_high() {
        // Heavy-volume push to 5030, then reversion down past the
        // minimum percentage.
        let candles = vec![
            candle(0, 5002.0, 4998.0, 5000.0, 100.0),
            candle(1, 5005.0, 5000.0, 5004.0, 100.0),
            candle(2, 5030.0, 5004.0, 5028.0, 400.0), // breakout bar
            candle(3, 5028.0, 5015.0, 5016.0, 100.0),
            candle(4, 5016.0, 5008.0, 5010.0, 100.0), // reverted
        ];
        let signal = detect(&candles, &config(), 300_000).unwrap();
        assert_eq!(signal.kind, SignalKind::TrappedParticipants);
        assert_eq!(signal.direction, Direction::Bearish);
        assert!(signal.actionable);
    }

    #[test]
    fn test_trapped_sellers_at_low() {
        let candles = vec![
            candle(0, 5002.0, 4998.0, 5000.0, 100.0),
            candle(1, 5000.0, 4996.0, 4997.0, 100.0),
            candle(2, 4997.0, 4970.0, 4972.0, 400.0), // flush bar
            candle(3, 4985.0, 4972.0, 4984.0, 100.0),
            candle(4, 4992.0, 4984.0, 4990.0, 100.0), // reverted up
        ];
        let signal = detect(&candles, &config(), 300_000).unwrap();
        assert_eq!(signal.direction, Direction::Bullish);
    }

    #[test]
    fn test_normal_volume_extreme_is_not_trapped() {
        // Same shape but the extreme bar's volume is unremarkable.
        let candles = vec![
            candle(0, 5002.0, 4998.0, 5000.0, 100.0),
            candle(1, 5005.0, 5000.0, 5004.0, 100.0),
            candle(2, 5030.0, 5004.0, 5028.0, 110.0),
            candle(3, 5028.0, 5015.0, 5016.0, 100.0),
            candle(4, 5016.0, 5008.0, 5010.0, 100.0),
        ];
        assert!(detect(&candles, &config(), 300_000).is_none());
    }

    #[test]
    fn test_no_reversion_no_signal() {
        // Heavy-volume breakout that holds its gains.
        let candles = vec![
            candle(0, 5002.0, 4998.0, 5000.0, 100.0),
            candle(1, 5005.0, 5000.0, 5004.0, 100.0),
            candle(2, 5030.0, 5004.0, 5028.0, 400.0),
            candle(3, 5032.0, 5026.0, 5030.0, 100.0),
            candle(4, 5033.0, 5028.0, 5031.0, 100.0),
        ];
        assert!(detect(&candles, &config(), 300_000).is_none());
    }

    #[test]
    fn test_short_window_no_signal() {
        let candles = vec![
            candle(0, 5002.0, 4998.0, 5000.0, 100.0),
            candle(1, 5005.0, 5000.0, 5004.0, 400.0),
        ];
        assert!(detect(&candles, &config(), 120_000).is_none());
    }
}
