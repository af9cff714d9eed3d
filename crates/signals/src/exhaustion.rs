//! Exhaustion: a directional move running out of participation.
//!
//! The window splits in half. If price kept moving in one direction in
//! the second half while its volume and/or absolute delta declined
//! materially against the first half, the move is exhausting and the
//! signal points the opposite way.

use crate::score;
use flowtrader_core::{
    Candle, Direction, OrderFlowSignal, SignalConfig, SignalKind, TimestampMs,
};

/// Detect exhaustion over the most recent `config.window_bars` bars.
pub fn detect(
    candles: &[Candle],
    config: &SignalConfig,
    now: TimestampMs,
) -> Option<OrderFlowSignal> {
    let start = candles.len().saturating_sub(config.window_bars);
    let window = &candles[start..];
    if window.len() < 6 {
        return None;
    }

    let mid = window.len() / 2;
    let (first, second) = window.split_at(mid);

    // Price must continue in one direction through the second half.
    let first_move = first.last()?.close - first.first()?.close;
    let second_move = second.last()?.close - second.first()?.close;
    let continuing_up = first_move > 0.0 && second_move > 0.0;
    let continuing_down = first_move < 0.0 && second_move < 0.0;
    if !continuing_up && !continuing_down {
        return None;
    }

    let first_volume: f64 = first.iter().map(|c| c.volume).sum();
    let second_volume: f64 = second.iter().map(|c| c.volume).sum();
    let first_delta: f64 = first.iter().map(|c| c.delta).sum::<f64>().abs();
    let second_delta: f64 = second.iter().map(|c| c.delta).sum::<f64>().abs();

    let volume_decline = if first_volume > 0.0 {
        1.0 - second_volume / first_volume
    } else {
        0.0
    };
    let delta_decline = if first_delta > 0.0 {
        1.0 - second_delta / first_delta
    } else {
        0.0
    };

    let decline = volume_decline.max(delta_decline);
    if decline < config.exhaustion_decline_frac {
        return None;
    }

    let move_dir = if continuing_up {
        Direction::Bullish
    } else {
        Direction::Bearish
    };

    Some(OrderFlowSignal {
        kind: SignalKind::Exhaustion,
        // Signal points against the exhausting move.
        direction: move_dir.opposite(),
        strength: score(decline * 100.0),
        confidence: score(40.0 + 60.0 * (decline - config.exhaustion_decline_frac)
            / (1.0 - config.exhaustion_decline_frac).max(1e-9)),
        actionable: true,
        ts_ms: now,
    })
}
