//! Tracing setup for binaries and long-running deployments.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber from `RUST_LOG`, defaulting
/// to `info`. Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
