//! Tracing subscriber setup for shells that do not install their own

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, or by `default_directive`
/// when `RUST_LOG` is unset.
///
/// Returns an error if a global subscriber is already installed.
pub fn init(default_directive: &str) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| crate::SimError::config_error(format!("invalid log filter: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| crate::SimError::config_error(format!("tracing already initialised: {}", e)))
}
