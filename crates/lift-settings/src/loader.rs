//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`LiftSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `LIFT_*` environment overrides (highest priority)
//! 4. Validate the result

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::LiftSettings;

/// Directory holding the default settings file and database (`~/.lift`).
pub fn lift_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".lift")
}

/// Resolve the path to the settings file (`~/.lift/settings.json`).
pub fn settings_path() -> PathBuf {
    lift_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<LiftSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<LiftSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults with the file merged over them, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<LiftSettings> {
    let defaults = serde_json::to_value(LiftSettings::default())?;

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
///
/// Objects merge per key, arrays and primitives are replaced, and nulls in
/// `source` keep the target value.
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
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `LIFT_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut LiftSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`. Invalid values are logged and
/// ignored.
pub fn apply_overrides(settings: &mut LiftSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = read("LIFT_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("LIFT_PORT") {
        match parse_u64_range(&v, 0, u64::from(u16::MAX)) {
            Some(port) => settings.server.port = port as u16,
            None => warn!(key = "LIFT_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = read("LIFT_ALLOWED_ORIGINS") {
        settings.server.allowed_origins = v.split_whitespace().map(str::to_string).collect();
    }
    if let Some(v) = read("LIFT_DB_PATH") {
        settings.store.db_path = v;
    }
    if let Some(v) = read("LIFT_QUEUE_CAPACITY") {
        match parse_u64_range(&v, 1, 1_000_000) {
            Some(n) => settings.dispatch.queue_capacity = n as usize,
            None => warn!(key = "LIFT_QUEUE_CAPACITY", value = %v, "invalid capacity env var, ignoring"),
        }
    }
    if let Some(v) = read("LIFT_ADMISSION_MARGIN") {
        match parse_u64_range(&v, 0, 1_000_000) {
            Some(n) => settings.dispatch.admission_margin = n as usize,
            None => warn!(key = "LIFT_ADMISSION_MARGIN", value = %v, "invalid margin env var, ignoring"),
        }
    }
    if let Some(v) = read("LIFT_COMPLETION_DELAY_MS") {
        match parse_u64_range(&v, 0, 3_600_000) {
            Some(n) => settings.dispatch.completion_delay_ms = n,
            None => warn!(key = "LIFT_COMPLETION_DELAY_MS", value = %v, "invalid delay env var, ignoring"),
        }
    }
    if let Some(v) = read("LIFT_DEFAULT_REQUEST_FILTER") {
        match v.parse() {
            Ok(filter) => settings.dispatch.default_request_filter = filter,
            Err(e) => warn!(key = "LIFT_DEFAULT_REQUEST_FILTER", error = %e, "ignoring"),
        }
    }
    if let Some(v) = read("LIFT_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("LIFT_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => warn!(key = "LIFT_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }
}

/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
