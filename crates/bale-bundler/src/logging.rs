//! Optional tracing-subscriber setup for binaries and tests.
//!
//! Library code only emits `tracing` events; installing a subscriber
//! is the embedder's call. This module offers a compact default for
//! tools that do not bring their own.

use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a compact subscriber filtered by `directive`
/// (e.g. `"bale_bundler=debug"`). Safe to call more than once.
pub fn init_logging(directive: &str) {
    let directive = directive.to_string();
    INIT.call_once(move || {
        let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .without_time(),
            )
            .init();
    });
}

/// Like [`init_logging`], reading the directive from `RUST_LOG`.
pub fn init_logging_from_env() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .without_time(),
            )
            .init();
    });
}
