//! # pulse-logging
//!
//! `tracing` subscriber setup for the pulse server.
//!
//! `RUST_LOG` takes precedence over the configured level so a single module
//! can be turned up without touching the settings file.

#![deny(unsafe_code)]

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Output format for log lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, one event per line.
    #[default]
    Pretty,
    /// JSON lines with target and span list.
    Json,
}

impl LogFormat {
    /// Pick the format from the settings flag.
    pub fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Pretty }
    }
}

/// Build the filter directive for a default level.
///
/// Keeps the noisy HTTP stack one level quieter than our own crates unless
/// the caller asks for `trace`.
pub fn filter_directive(level: &str) -> String {
    let level = level.to_lowercase();
    if level == "trace" {
        return level;
    }
    format!("{level},hyper=warn,tower_http=info")
}

/// Build the env filter: `RUST_LOG` if set and valid, else `level`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(level)))
}

/// Install the global subscriber.
///
/// Returns `false` if a global subscriber was already installed (for
/// example by a test harness); the existing one is left in place.
pub fn init_subscriber(level: &str, format: LogFormat) -> bool {
    let filter = build_filter(level);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };
    result.is_ok()
}
