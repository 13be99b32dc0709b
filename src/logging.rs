//! Diagnostic logging setup
//!
//! The library only emits `tracing` events; binaries call [`init`] once to
//! install a stderr subscriber. `RUST_LOG` takes precedence over the
//! configured filter.

use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` if set and valid, otherwise `default_filter`.
pub fn build_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Returns false if one was already installed.
pub fn init(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(default_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
