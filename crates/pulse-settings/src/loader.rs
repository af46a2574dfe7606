//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PulseSettings::default()`]
//! 2. If `~/.pulse/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `PULSE_*` environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{LogLevel, PulseSettings};

/// Upper bound for `windowMs` and `writeTimeoutMs` (one hour).
const MAX_TIMEOUT_MS: u64 = 3_600_000;

/// Upper bound for `maxFrameBytes` (64 MiB).
const MAX_FRAME_BYTES: u64 = 64 * 1024 * 1024;

/// Resolve the path to the settings file (`~/.pulse/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pulse").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid value is an
/// error.
pub fn load_settings_from_path(path: &Path) -> Result<PulseSettings> {
    let defaults = serde_json::to_value(PulseSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: PulseSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut PulseSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Values that fail to parse or fall outside their range are ignored with a
/// warning, keeping the file/default value.
pub fn apply_overrides<F>(settings: &mut PulseSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("PULSE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("PULSE_PORT") {
        match v.trim().parse::<u16>() {
            Ok(port) => settings.server.port = port,
            Err(_) => warn_invalid("PULSE_PORT", &v),
        }
    }
    if let Some(v) = read("PULSE_WINDOW_MS") {
        match parse_u64_range(&v, 1, MAX_TIMEOUT_MS) {
            Some(ms) => settings.keepalive.window_ms = ms,
            None => warn_invalid("PULSE_WINDOW_MS", &v),
        }
    }
    if let Some(v) = read("PULSE_WRITE_TIMEOUT_MS") {
        match parse_u64_range(&v, 1, MAX_TIMEOUT_MS) {
            Some(ms) => settings.keepalive.write_timeout_ms = ms,
            None => warn_invalid("PULSE_WRITE_TIMEOUT_MS", &v),
        }
    }
    if let Some(v) = read("PULSE_MAX_FRAME_BYTES") {
        match parse_u64_range(&v, 1, MAX_FRAME_BYTES).and_then(|n| usize::try_from(n).ok()) {
            Some(bytes) => settings.keepalive.max_frame_bytes = bytes,
            None => warn_invalid("PULSE_MAX_FRAME_BYTES", &v),
        }
    }
    if let Some(v) = read("PULSE_LOG_LEVEL") {
        match LogLevel::parse(&v) {
            Some(level) => settings.logging.level = level,
            None => warn_invalid("PULSE_LOG_LEVEL", &v),
        }
    }
    if let Some(v) = read("PULSE_LOG_JSON") {
        match parse_bool(&v) {
            Some(json) => settings.logging.json = json,
            None => warn_invalid("PULSE_LOG_JSON", &v),
        }
    }
}

/// Reject settings the server cannot run with.
///
/// Uses the same bounds as the env overrides, so a value is valid no
/// matter which layer it came from.
pub fn validate(settings: &PulseSettings) -> Result<()> {
    let keepalive = &settings.keepalive;
    check_range("keepalive.windowMs", keepalive.window_ms, MAX_TIMEOUT_MS)?;
    check_range(
        "keepalive.writeTimeoutMs",
        keepalive.write_timeout_ms,
        MAX_TIMEOUT_MS,
    )?;
    let frame_bytes = u64::try_from(keepalive.max_frame_bytes).unwrap_or(u64::MAX);
    check_range("keepalive.maxFrameBytes", frame_bytes, MAX_FRAME_BYTES)
}

fn check_range(key: &str, value: u64, max: u64) -> Result<()> {
    if (1..=max).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::InvalidValue(format!(
            "{key} must be between 1 and {max}, got {value}"
        )))
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn warn_invalid(key: &str, value: &str) {
    tracing::warn!(key, value, "invalid env var, ignoring");
}
