//! Delta divergence: price makes a new extreme without participation.
//!
//! The window's running cumulative delta is compared at price extremes.
//! A new price high whose cumulative delta sits below the earlier delta
//! peak means the push lacked aggressive buying (bearish); the mirror
//! case at a new low is bullish.

use crate::score;
use flowtrader_core::{
    Candle, Direction, OrderFlowSignal, SignalConfig, SignalKind, TimestampMs,
};

/// Detect a divergence over the most recent `config.window_bars` bars.
pub fn detect(
    candles: &[Candle],
    config: &SignalConfig,
    now: TimestampMs,
) -> Option<OrderFlowSignal> {
    let window = tail(candles, config.window_bars);
    if window.len() < 4 {
        return None;
    }

    // Running cumulative delta across the window.
    let mut cum = Vec::with_capacity(window.len());
    let mut running = 0.0;
    for bar in window {
        running += bar.delta;
        cum.push(running);
    }

    let last = window.len() - 1;
    let last_bar = &window[last];
    let body = &window[..last];
    let cum_body = &cum[..last];

    let prior_high = body.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let prior_low = body.iter().map(|c| c.low).fold(f64::MAX, f64::min);

    // New price high without a new delta high: bearish divergence.
    if last_bar.high >= prior_high {
        let delta_peak = cum_body.iter().copied().fold(f64::MIN, f64::max);
        if cum[last] < delta_peak {
            return Some(build(
                Direction::Bearish,
                delta_peak,
                cum[last],
                config,
                now,
            ));
        }
    }

    // New price low without a new delta low: bullish divergence.
    if last_bar.low <= prior_low {
        let delta_trough = cum_body.iter().copied().fold(f64::MAX, f64::min);
        if cum[last] > delta_trough {
            return Some(build(
                Direction::Bullish,
                delta_trough,
                cum[last],
                config,
                now,
            ));
        }
    }

    None
}

fn build(
    direction: Direction,
    reference: f64,
    current: f64,
    config: &SignalConfig,
    now: TimestampMs,
) -> OrderFlowSignal {
    let denom = reference.abs().max(1.0);
    let divergence_pct = (reference - current).abs() / denom * 100.0;
    let actionable = divergence_pct >= config.min_divergence_pct;
    OrderFlowSignal {
        kind: SignalKind::Divergence,
        direction,
        strength: score(divergence_pct),
        confidence: score(40.0 + divergence_pct / 2.0),
        actionable,
        ts_ms: now,
    }
}

fn tail(candles: &[Candle], n: usize) -> &[Candle] {
    let start = candles.len().saturating_sub(n);
    &candles[start..]
}
