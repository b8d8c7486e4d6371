//! Logging setup.
//!
//! Flowscope itself only emits `tracing` events (context pushes, restored
//! envelopes, allocated directories). Binaries and test harnesses that want
//! to see them call [`init_tracing`] once at startup.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Environment variable selecting JSON log output.
pub const LOG_JSON_ENV: &str = "FLOWSCOPE_LOG_JSON";

/// Installs a global `fmt` subscriber filtered by `RUST_LOG` (default
/// `info`). Output is JSON when `FLOWSCOPE_LOG_JSON` is truthy.
///
/// Safe to call repeatedly; an already installed subscriber is left alone.
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let json = std::env::var(LOG_JSON_ENV)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }
    });
}
