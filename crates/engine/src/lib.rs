//! The flowtrader pipeline: a single-writer engine over every
//! aggregator, detector and state machine, plus the async actor that
//! serializes market data, order flow and control commands onto it.

pub mod actor;
pub mod logging;
pub mod pipeline;
pub mod snapshot;

pub use actor::{spawn_engine, EngineHandle};
pub use pipeline::MarketEngine;
pub use snapshot::StateSnapshot;
