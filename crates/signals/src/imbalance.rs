//! Stacked imbalance: consecutive one-sided footprint levels.
//!
//! A level is imbalanced when the dominant aggressor side carries at
//! least `imbalance_ratio` times the other side's volume; a stack needs
//! `stacked_min_levels` consecutive same-direction imbalances in price
//! order. Two consecutive levels never qualify with the default of 3.

use crate::score;
use flowtrader_core::{FootprintBar, OrderFlowSignal, SignalConfig, SignalKind, TimestampMs};

/// Detect a stacked imbalance on the most recent footprint bar.
pub fn detect(
    footprints: &[FootprintBar],
    config: &SignalConfig,
    now: TimestampMs,
) -> Option<OrderFlowSignal> {
    let bar = footprints.last()?;
    let runs = bar.stacked_runs(config.imbalance_ratio, config.stacked_min_levels);

    // Strongest run: longest, ratio breaking ties.
    let run = runs.into_iter().max_by(|a, b| {
        (a.length, a.avg_ratio)
            .partial_cmp(&(b.length, b.avg_ratio))
            .unwrap_or(std::cmp::Ordering::Equal)
    })?;

    let extra_levels = run.length.saturating_sub(config.stacked_min_levels) as f64;
    let ratio_excess = (run.avg_ratio - config.imbalance_ratio).max(0.0);

    Some(OrderFlowSignal {
        kind: SignalKind::StackedImbalance,
        direction: run.direction,
        strength: score(50.0 + 15.0 * extra_levels + 5.0 * ratio_excess),
        confidence: score(55.0 + 10.0 * extra_levels + 5.0 * ratio_excess),
        actionable: true,
        ts_ms: now,
    })
}
