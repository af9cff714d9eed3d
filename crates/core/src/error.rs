//! Error types for the flowtrader system.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the flowtrader system.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error. Missing safety authorization is the one
    /// fatal startup condition.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data-integrity error: malformed or out-of-range ingress payload.
    /// Rejected at the boundary, never stored.
    #[error("Ingress rejected: {0}")]
    Ingress(String),

    /// Insufficient history for a computation (no VWAP yet, empty
    /// composite). Callers map this to an explicit no-context outcome.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Volume profile / value area computation error.
    #[error("Profile error: {0}")]
    Profile(String),

    /// Signal detection error.
    #[error("Signal error: {0}")]
    Signal(String),

    /// Decision engine error.
    #[error("Decision error: {0}")]
    Decision(String),

    /// Safety-invariant refusal: duplicate pending order, fence active,
    /// drawdown breached, bad authorization.
    #[error("Safety refusal: {0}")]
    Safety(String),

    /// Execution failure reported by the broker collaborator.
    #[error("Execution error: {0}")]
    Execution(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an ingress rejection.
    pub fn ingress(msg: impl Into<String>) -> Self {
        Error::Ingress(msg.into())
    }

    /// Create an insufficient data error.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Error::InsufficientData(msg.into())
    }

    /// Create a profile error.
    pub fn profile(msg: impl Into<String>) -> Self {
        Error::Profile(msg.into())
    }

    /// Create a signal error.
    pub fn signal(msg: impl Into<String>) -> Self {
        Error::Signal(msg.into())
    }

    /// Create a decision error.
    pub fn decision(msg: impl Into<String>) -> Self {
        Error::Decision(msg.into())
    }

    /// Create a safety refusal.
    pub fn safety(msg: impl Into<String>) -> Self {
        Error::Safety(msg.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Error::Execution(msg.into())
    }
}
