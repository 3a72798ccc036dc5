//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`AltnetSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `ALTNET_*` environment overrides (highest priority)
//! 4. [`validate`] clamps out-of-range values

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::AltnetSettings;

/// `~/.altnet`, or `/tmp/.altnet` without a home directory.
pub fn altnet_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".altnet")
}

/// Resolve the path to the settings file (`~/.altnet/settings.json`).
pub fn settings_path() -> PathBuf {
    altnet_dir().join("settings.json")
}

/// Database file named in the settings, or the default location.
pub fn store_path(settings: &AltnetSettings) -> PathBuf {
    settings
        .store
        .path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| altnet_dir().join("altnet.db"))
}

pub fn load_settings() -> Result<AltnetSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<AltnetSettings> {
    let mut settings = load_file_layer(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    validate(&mut settings)?;
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<AltnetSettings> {
    let defaults = serde_json::to_value(AltnetSettings::default())?;

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
/// `source` leave `target` untouched.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `ALTNET_*` overrides read through `lookup`.
///
/// Values that fail to parse or fall outside their range are ignored with a
/// warning.
pub fn apply_overrides(settings: &mut AltnetSettings, lookup: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let ranged = |name: &str, min: u64, max: u64| {
        let val = lookup(name)?;
        let parsed = parse_u64_range(&val, min, max);
        if parsed.is_none() {
            warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        parsed
    };
    let boolean = |name: &str| {
        let val = lookup(name)?;
        let parsed = parse_bool(&val);
        if parsed.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        parsed
    };

    // ── Generator ───────────────────────────────────────────────────
    if let Some(v) = string("ALTNET_API_KEY") {
        settings.generator.api_key = Some(v);
    }
    if let Some(v) = string("ALTNET_ENDPOINT") {
        settings.generator.endpoint = v;
    }
    if let Some(v) = string("ALTNET_MODEL") {
        settings.generator.model = v;
    }
    if let Some(v) = boolean("ALTNET_TONAL_MODIFIERS") {
        settings.generator.tonal_modifiers = v;
    }

    // ── Assets ──────────────────────────────────────────────────────
    if let Some(v) = string("ALTNET_IMAGE_KEY") {
        settings.assets.api_key = Some(v);
    }
    if let Some(v) = ranged("ALTNET_IMAGES_PER_PAGE", 1, 3) {
        settings.assets.images_per_page = v as usize;
    }
    if let Some(v) = ranged("ALTNET_IMAGE_TIMEOUT_SECS", 1, 600) {
        settings.assets.timeout_secs = v;
    }

    // ── Feed / publish ──────────────────────────────────────────────
    if let Some(v) = ranged("ALTNET_FEED_LIMIT", 1, 500) {
        settings.feed.limit = v as usize;
    }
    if let Some(v) = ranged("ALTNET_CACHE_TTL_SECS", 1, 86_400) {
        settings.feed.cache_ttl_secs = v;
    }
    if let Some(v) = string("ALTNET_AUTHOR") {
        settings.publish.author_name = v;
    }
    if let Some(v) = boolean("ALTNET_PUBLISH") {
        settings.publish.enabled = v;
    }

    // ── Store / logging ─────────────────────────────────────────────
    if let Some(v) = string("ALTNET_DB_PATH") {
        settings.store.path = Some(v);
    }
    if let Some(v) = string("ALTNET_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = boolean("ALTNET_LOG_JSON") {
        settings.logging.json = v;
    }
}

/// Clamp soft limits into range; reject values nothing can recover from.
pub fn validate(settings: &mut AltnetSettings) -> Result<()> {
    if settings.generator.endpoint.trim().is_empty() {
        return Err(SettingsError::InvalidValue("generator.endpoint is empty".into()));
    }
    if settings.assets.primary_base.trim().is_empty() {
        return Err(SettingsError::InvalidValue("assets.primaryBase is empty".into()));
    }

    let images = settings.assets.images_per_page.clamp(1, 3);
    if images != settings.assets.images_per_page {
        warn!(from = settings.assets.images_per_page, to = images, "clamping assets.imagesPerPage");
        settings.assets.images_per_page = images;
    }

    let temperature = settings.generator.temperature;
    let clamped = if temperature.is_finite() { temperature.clamp(0.0, 2.0) } else { 0.85 };
    if clamped != temperature {
        warn!(from = temperature, to = clamped, "clamping generator.temperature");
        settings.generator.temperature = clamped;
    }

    settings.feed.limit = settings.feed.limit.max(1);
    settings.feed.welcome_limit = settings.feed.welcome_limit.max(1);
    settings.feed.not_ready_attempts = settings.feed.not_ready_attempts.max(1);
    settings.feed.cache_ttl_secs = settings.feed.cache_ttl_secs.max(1);
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

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
