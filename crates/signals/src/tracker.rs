//! Retention of actionable signals.
//!
//! The tracker keeps only actionable signals and discards them once
//! they age past the retention window, whether or not anything consumed
//! them.

use flowtrader_core::{Direction, OrderFlowSignal, SignalKind, TimestampMs};
use std::collections::VecDeque;
use tracing::debug;

/// Time-boxed store of actionable order-flow signals.
pub struct SignalTracker {
    retention_ms: i64,
    signals: VecDeque<OrderFlowSignal>,
}

impl SignalTracker {
    pub fn new(retention_secs: u32) -> Self {
        Self {
            retention_ms: retention_secs as i64 * 1000,
            signals: VecDeque::new(),
        }
    }

    /// Record a detector output. Non-actionable signals are dropped.
    pub fn record(&mut self, signal: Option<OrderFlowSignal>) {
        if let Some(signal) = signal {
            if signal.actionable {
                debug!(target: "signals", kind = ?signal.kind, direction = ?signal.direction,
                       strength = signal.strength, "signal retained");
                self.signals.push_back(signal);
            }
        }
    }

    /// Discard signals older than the retention window.
    pub fn prune(&mut self, now: TimestampMs) {
        while let Some(front) = self.signals.front() {
            if now - front.ts_ms > self.retention_ms {
                self.signals.pop_front();
            } else {
                break;
            }
        }
    }

    /// All retained signals, oldest first.
    pub fn active(&self) -> impl Iterator<Item = &OrderFlowSignal> {
        self.signals.iter()
    }

    /// Most recent retained signal of a kind.
    pub fn latest(&self, kind: SignalKind) -> Option<&OrderFlowSignal> {
        self.signals.iter().rev().find(|s| s.kind == kind)
    }

    /// Most recent retained signal of a kind and direction.
    pub fn latest_directed(
        &self,
        kind: SignalKind,
        direction: Direction,
    ) -> Option<&OrderFlowSignal> {
        self.signals
            .iter()
            .rev()
            .find(|s| s.kind == kind && s.direction == direction)
    }

    /// Number of retained signals.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Snapshot for state egress.
    pub fn to_vec(&self) -> Vec<OrderFlowSignal> {
        self.signals.iter().cloned().collect()
    }

    /// Clear all retained signals.
    pub fn clear(&mut self) {
        self.signals.clear();
    }
}
