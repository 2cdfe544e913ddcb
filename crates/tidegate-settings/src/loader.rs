//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`GatewaySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate cross-field constraints
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tidegate_core::ToolPolicy;
use tidegate_core::logging::LogFormat;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::GatewaySettings;

/// Resolve the path to the settings file (`~/.tidegate/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tidegate").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<GatewaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or values that fail
/// [`validate`] are errors.
pub fn load_settings_from_path(path: &Path) -> Result<GatewaySettings> {
    let mut settings = read_layered(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults with the settings file merged over them, no env layer.
fn read_layered(path: &Path) -> Result<GatewaySettings> {
    let defaults = serde_json::to_value(GatewaySettings::default())?;

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

/// Check constraints that serde defaults cannot express.
pub fn validate(settings: &GatewaySettings) -> Result<()> {
    if settings.stream.channel_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "stream.channelCapacity must be greater than 0".into(),
        ));
    }
    if settings.stream.max_line_bytes < 1024 {
        return Err(SettingsError::InvalidValue(
            "stream.maxLineBytes must be at least 1024".into(),
        ));
    }
    if settings.upstream.completion_url.trim().is_empty() {
        return Err(SettingsError::InvalidValue(
            "upstream.completionUrl must not be empty".into(),
        ));
    }
    for (i, model) in settings.models.iter().enumerate() {
        if model.id.trim().is_empty() {
            return Err(SettingsError::InvalidValue(format!("models[{i}].id is empty")));
        }
        if settings.models[..i]
            .iter()
            .any(|m| m.id.eq_ignore_ascii_case(&model.id))
        {
            return Err(SettingsError::InvalidValue(format!(
                "duplicate model id: {}",
                model.id
            )));
        }
    }
    Ok(())
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut GatewaySettings) {
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TIDEGATE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("TIDEGATE_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_string("TIDEGATE_API_KEYS") {
        settings.server.api_keys = parse_list(&v);
    }

    // ── Stream ──────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("TIDEGATE_STREAM_IDLE_SECS", 1, 3600) {
        settings.stream.idle_timeout_secs = v;
    }

    // ── Tools ───────────────────────────────────────────────────────
    if let Ok(v) = std::env::var("TIDEGATE_TOOL_POLICY") {
        match ToolPolicy::parse(&v) {
            Some(policy) => settings.tools.policy = policy,
            None => tracing::warn!(key = "TIDEGATE_TOOL_POLICY", value = %v, "invalid tool policy, ignoring"),
        }
    }

    // ── Upstream ────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TIDEGATE_UPSTREAM_URL") {
        settings.upstream.completion_url = v;
    }
    if let Some(v) = read_env_string("TIDEGATE_UPSTREAM_TOKEN") {
        settings.upstream.token = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TIDEGATE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Ok(v) = std::env::var("TIDEGATE_LOG_FORMAT") {
        match LogFormat::parse(&v) {
            Some(format) => settings.logging.format = format,
            None => tracing::warn!(key = "TIDEGATE_LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

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

/// Split a comma-separated list, dropping blanks.
pub fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
