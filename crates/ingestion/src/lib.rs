//! Data ingestion and tick aggregation for the flowtrader system.
//!
//! This crate handles:
//! - Ingress validation (data-integrity boundary)
//! - Aggressor side inference (bid/ask classification)
//! - Candle building from classified ticks
//! - Footprint bars (per-price bid/ask ledgers)
//! - Daily volume profiles and value areas
//! - VWAP with standard-deviation bands

pub mod candle;
pub mod classifier;
pub mod footprint;
pub mod profile;
pub mod validator;
pub mod vwap;

pub use candle::CandleBuilder;
pub use classifier::AggressorClassifier;
pub use footprint::FootprintBuilder;
pub use profile::{compute_value_area, ProfileBuilder};
pub use validator::IngressValidator;
pub use vwap::VwapCalculator;
