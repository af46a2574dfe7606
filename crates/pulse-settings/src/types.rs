//! Settings types.
//!
//! All structs use `#[serde(default)]` so a partial settings file only needs
//! the keys it changes. Keys are camelCase on disk.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PulseSettings {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Connection keepalive timing and limits.
    pub keepalive: KeepaliveSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// HTTP listener and upgrade settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` for auto-assign).
    pub port: u16,
    /// Read buffer size handed to the WebSocket upgrade.
    pub read_buffer_size: usize,
    /// Write buffer size handed to the WebSocket upgrade.
    pub write_buffer_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            read_buffer_size: 1024,
            write_buffer_size: 1024,
        }
    }
}

/// Ping/pong keepalive settings.
///
/// The heartbeat period is not configurable: it is always 9/10 of
/// `window_ms`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeepaliveSettings {
    /// Read deadline window in milliseconds.
    pub window_ms: u64,
    /// Per-send write bound in milliseconds.
    pub write_timeout_ms: u64,
    /// Largest inbound frame accepted, in bytes.
    pub max_frame_bytes: usize,
}

impl KeepaliveSettings {
    /// Read deadline window.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Per-send write bound.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for KeepaliveSettings {
    fn default() -> Self {
        Self {
            window_ms: 5_000,
            write_timeout_ms: 10_000,
            max_frame_bytes: 512,
        }
    }
}

/// Log verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level (most verbose).
    Trace,
    /// Debug-level.
    Debug,
    /// Info-level.
    #[default]
    Info,
    /// Warn-level.
    Warn,
    /// Error-level.
    Error,
}

impl LogLevel {
    /// Convert to a tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Parse a level name (case-insensitive).
    pub fn parse(val: &str) -> Option<Self> {
        match val.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level when `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keepalive_matches_reference_timings() {
        let k = KeepaliveSettings::default();
        assert_eq!(k.window(), Duration::from_secs(5));
        assert_eq!(k.write_timeout(), Duration::from_secs(10));
        assert_eq!(k.max_frame_bytes, 512);
    }

    #[test]
    fn default_server() {
        let s = ServerSettings::default();
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.port, 8000);
        assert_eq!(s.read_buffer_size, 1024);
        assert_eq!(s.write_buffer_size, 1024);
    }

    #[test]
    fn camel_case_keys() {
        let json = serde_json::to_value(PulseSettings::default()).unwrap();
        assert_eq!(json["keepalive"]["windowMs"], 5000);
        assert_eq!(json["keepalive"]["writeTimeoutMs"], 10000);
        assert_eq!(json["keepalive"]["maxFrameBytes"], 512);
        assert_eq!(json["server"]["readBufferSize"], 1024);
        assert_eq!(json["logging"]["level"], "info");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: PulseSettings =
            serde_json::from_str(r#"{"keepalive":{"windowMs":2000}}"#).unwrap();
        assert_eq!(settings.keepalive.window_ms, 2000);
        assert_eq!(settings.keepalive.write_timeout_ms, 10_000);
        assert_eq!(settings.server.port, 8000);
    }

    #[test]
    fn log_level_parse() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn log_level_as_filter_str() {
        assert_eq!(LogLevel::Trace.as_filter_str(), "trace");
        assert_eq!(LogLevel::Info.as_filter_str(), "info");
        assert_eq!(LogLevel::Error.as_filter_str(), "error");
    }
}
