//! Initiative vs. responsive activity outside the value area.
//!
//! Sustained trade beyond VAH/VAL on above-average volume is initiative
//! (new business, continuation bias). The same excursion on
//! below-average volume is responsive (fade bias, rotation back toward
//! value).

use crate::score;
use flowtrader_core::{
    Candle, Direction, OrderFlowSignal, SignalConfig, SignalKind, TimestampMs, ValueArea,
};
use statrs::statistics::Statistics;

/// Detect initiative or responsive activity against a value area.
pub fn detect(
    candles: &[Candle],
    value_area: &ValueArea,
    config: &SignalConfig,
    now: TimestampMs,
) -> Option<OrderFlowSignal> {
    let start = candles.len().saturating_sub(config.window_bars);
    let window = &candles[start..];
    if window.len() < config.initiative_min_bars + 1 {
        return None;
    }

    // Count consecutive closes outside value at the end of the window,
    // all on the same side.
    let mut above = 0usize;
    let mut below = 0usize;
    for bar in window.iter().rev() {
        if bar.close > value_area.vah && below == 0 {
            above += 1;
        } else if bar.close < value_area.val && above == 0 {
            below += 1;
        } else {
            break;
        }
    }

    let (outside, breakout_dir) = if above > 0 {
        (above, Direction::Bullish)
    } else {
        (below, Direction::Bearish)
    };
    if outside < config.initiative_min_bars {
        return None;
    }

    let window_avg = window.iter().map(|c| c.volume).collect::<Vec<_>>().mean();
    if window_avg <= 0.0 {
        return None;
    }
    let outside_bars = &window[window.len() - outside..];
    let outside_avg = outside_bars
        .iter()
        .map(|c| c.volume)
        .collect::<Vec<_>>()
        .mean();

    let volume_ratio = outside_avg / window_avg;
    let duration_bonus = (outside - config.initiative_min_bars) as f64 * 5.0;

    if volume_ratio > 1.0 {
        // Above-average volume outside value: initiative.
        Some(OrderFlowSignal {
            kind: SignalKind::Initiative,
            direction: breakout_dir,
            strength: score(40.0 * volume_ratio + duration_bonus),
            confidence: score(50.0 + 20.0 * (volume_ratio - 1.0) + duration_bonus),
            actionable: true,
            ts_ms: now,
        })
    } else {
        // Below-average volume: responsive, bias back toward value.
        Some(OrderFlowSignal {
            kind: SignalKind::Responsive,
            direction: breakout_dir.opposite(),
            strength: score(40.0 * (1.0 / volume_ratio.max(0.1)).min(2.5) + duration_bonus),
            confidence: score(45.0 + 25.0 * (1.0 - volume_ratio) + duration_bonus),
            actionable: true,
            ts_ms: now,
        })
    }
}
