//! Tracing initialization.
//!
//! `RUST_LOG` wins when set; otherwise `DISTBUILD_LOG` (default `distbuild=info`).
//! `DISTBUILD_LOG_JSON=1` switches to JSON lines. Logs go to stderr so that
//! `--json` reports on stdout stay machine-readable.

use tracing_subscriber::{EnvFilter, prelude::*};

const LOG_LEVEL: &str = "DISTBUILD_LOG";
const LOG_JSON: &str = "DISTBUILD_LOG_JSON";
const DEFAULT_LEVEL: &str = "distbuild_core=info,distbuild=info";

fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Call once at process startup.
pub fn init_tracing() {
    let level = std::env::var(LOG_LEVEL)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if env_bool(LOG_JSON) {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}
