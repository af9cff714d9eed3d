//! Setup recognition and trade decisions for the flowtrader system.
//!
//! The recognizer combines composite context, migration, VWAP bands and
//! retained order-flow signals into ranked recommendations with
//! explicit invalidation. The decision engine turns recommendations
//! plus the current position into a single gated action, evaluating
//! exits before any entry.

pub mod decision;
pub mod setups;

pub use decision::{DecisionEngine, DecisionInputs, OpenTrade};
pub use setups::{MarketContext, SetupRecognizer};
