//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BridgeSettings::default()`]
//! 2. If a settings file is given and exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::BridgeSettings;

/// Environment variable naming an optional settings file.
pub const CONFIG_PATH_ENV: &str = "TASBRIDGE_CONFIG";

/// Resolve the settings file: an explicit path wins over `TASBRIDGE_CONFIG`.
pub fn settings_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| read_env_string(CONFIG_PATH_ENV).map(PathBuf::from))
}

/// Load settings from an optional file with env var overrides.
pub fn load_settings(explicit: Option<&Path>) -> Result<BridgeSettings> {
    match settings_path(explicit) {
        Some(path) => load_settings_from_path(&path),
        None => {
            let mut settings = BridgeSettings::default();
            apply_env_overrides(&mut settings);
            Ok(settings)
        }
    }
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<BridgeSettings> {
    let mut settings = merge_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn merge_file(path: &Path) -> Result<BridgeSettings> {
    let defaults = serde_json::to_value(BridgeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
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
pub fn apply_env_overrides(settings: &mut BridgeSettings) {
    apply_overrides(settings, read_env_string);
}

/// Apply overrides from any key lookup.
///
/// Invalid values are ignored with a warning and the file/default value kept.
pub fn apply_overrides(settings: &mut BridgeSettings, lookup: impl Fn(&str) -> Option<String>) {
    let warn_invalid = |key: &str, value: &str| {
        tracing::warn!(key, value, "invalid env var, ignoring");
    };

    if let Some(v) = lookup("API_KEY") {
        settings.api_key = v;
    }

    // ── HTTP ────────────────────────────────────────────────────────
    if let Some(v) = lookup("HOST") {
        settings.http.host = v;
    }
    if let Some(v) = lookup("PORT") {
        match parse_u16_range(&v, 1, 65535) {
            Some(port) => settings.http.port = port,
            None => warn_invalid("PORT", &v),
        }
    }

    // ── MQTT ────────────────────────────────────────────────────────
    if let Some(v) = lookup("MQTT_HOST") {
        settings.mqtt.host = Some(v);
    }
    if let Some(v) = lookup("MQTT_PORT") {
        match parse_u16_range(&v, 1, 65535) {
            Some(port) => settings.mqtt.port = port,
            None => warn_invalid("MQTT_PORT", &v),
        }
    }
    if let Some(v) = lookup("MQTT_USERNAME") {
        settings.mqtt.username = Some(v);
    }
    if let Some(v) = lookup("MQTT_PASSWORD") {
        settings.mqtt.password = Some(v);
    }
    if let Some(v) = lookup("MQTT_PROTOCOL") {
        match v.parse() {
            Ok(protocol) => settings.mqtt.protocol = protocol,
            Err(_) => warn_invalid("MQTT_PROTOCOL", &v),
        }
    }
    if let Some(v) = lookup("MQTT_TOPIC") {
        settings.mqtt.topic = Some(v);
    }
    if let Some(v) = lookup("MQTT_CLIENT_ID") {
        settings.mqtt.client_id = Some(v);
    }
    if let Some(v) = lookup("MQTT_KEEPALIVE_SECS") {
        match parse_u64_range(&v, 5, 3600) {
            Some(secs) => settings.mqtt.keep_alive_secs = secs,
            None => warn_invalid("MQTT_KEEPALIVE_SECS", &v),
        }
    }
    if let Some(v) = lookup("MQTT_RECONNECT_PERIOD_MS") {
        match parse_u64_range(&v, 100, 600_000) {
            Some(ms) => settings.mqtt.reconnect_period_ms = ms,
            None => warn_invalid("MQTT_RECONNECT_PERIOD_MS", &v),
        }
    }

    // ── Device ──────────────────────────────────────────────────────
    if let Some(v) = lookup("TASMOTA_MAC") {
        settings.device.mac = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = lookup("LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = lookup("LOG_JSON") {
        match parse_bool(&v) {
            Some(json) => settings.logging.json = json,
            None => warn_invalid("LOG_JSON", &v),
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

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

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
