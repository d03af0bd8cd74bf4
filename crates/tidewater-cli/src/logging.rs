//! Log output for the `tidewater` binary.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber, writing to stderr so stdout carries only
/// command results.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies.
///
/// # Errors
///
/// Returns an error for an unparsable level or if a subscriber is already set.
pub fn init(default_level: &str) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("Invalid log level '{default_level}'"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))
}
