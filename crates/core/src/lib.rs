//! Core types and configuration for the flowtrader system.
//!
//! This crate provides shared types used across all other crates:
//! - Market data types (ticks, candles, footprints, profiles)
//! - Trading types (signals, recommendations, decisions, orders)
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::{Error, Result};
pub use types::*;
