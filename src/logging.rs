//! Tracing initialization for library consumers and test binaries.
//!
//! The crate itself only emits `tracing` spans/events; it never installs a
//! subscriber. This module is a convenience for binaries, examples, and
//! integration tests that want a reasonable default (env-filtered, compact
//! formatting) without each one repeating the boilerplate.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a default `tracing-subscriber` once per process.
///
/// Reads `RUST_LOG` if set, otherwise defaults to `warn`. Safe to call from
/// multiple tests; only the first call has any effect.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
