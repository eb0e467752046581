//! Tracing setup helpers.
//!
//! The layer itself only emits `tracing` events; embedding applications
//! usually install their own subscriber. These helpers cover the standalone
//! case (examples, integration tests, small services).

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,condenser=debug";

/// Install a global subscriber reading `RUST_LOG`.
///
/// `json` switches the output to one JSON object per line for log shippers;
/// otherwise events are formatted for humans. Calling this twice is a no-op
/// (the second subscriber fails to install and is dropped).
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    if result.is_err() {
        tracing::debug!("subscriber already installed, keeping existing one");
    }
}
