//! Order-flow signal detectors for the flowtrader system.
//!
//! Each detector is a stateless-per-call function over a short rolling
//! window of closed bars (or footprint bars) returning at most one
//! typed signal per call. Only actionable signals are retained by the
//! tracker, and retained signals expire after a fixed age regardless
//! of consumption.

pub mod absorption;
pub mod divergence;
pub mod exhaustion;
pub mod imbalance;
pub mod initiative;
pub mod tracker;
pub mod trapped;

pub use tracker::SignalTracker;

/// Clamp a raw score into the 0-100 signal scale.
pub(crate) fn score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}
