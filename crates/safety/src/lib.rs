//! Safety gating and position accounting for the flowtrader system.
//!
//! The gate is the final authority before any order reaches the
//! execution collaborator: it owns the pending-order queue, the
//! connectivity fence, reject cooldowns, and the drawdown circuit
//! breaker, and it refuses to start without an authorization secret.

pub mod gate;
pub mod position;

pub use gate::{SafetyGate, SafetyStatus};
pub use position::PositionTracker;
