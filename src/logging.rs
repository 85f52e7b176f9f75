//! Log subscriber setup.
//!
//! The library only emits `tracing` events; binaries and demos call
//! [`init_logging`] once to print them. Levels come from `RUST_LOG`
//! (default `info`).

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Compact human-readable lines.
    #[default]
    Pretty,
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let registry = tracing_subscriber::registry().with(env_filter);
        // try_init: a subscriber installed elsewhere (e.g. by a test harness) wins
        let _ = match format {
            LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
            LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).try_init(),
        };
    });
}

/// Route events to the test harness's captured output.
pub fn init_test_logging() {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ghcn_columnar=debug")),
        )
        .with_test_writer()
        .try_init();
}
