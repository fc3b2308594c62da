//! Settings loading.
//!
//! Loading flow:
//! 1. Start with compiled [`BasketSettings::default()`]
//! 2. If the settings file exists, merge its values over the defaults
//! 3. Merge `BASKET_*` environment variables (highest priority)
//!
//! Nothing here validates: callers layer their own overrides (CLI flags) on
//! top and then call [`BasketSettings::validate`] once.
//!
//! Environment keys use `__` between sections and `SNAKE_CASE` within a
//! name: `BASKET_BROADCAST__GATEWAY__APP_ID` sets `broadcast.gateway.appId`.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use tracing::debug;

use crate::errors::Result;
use crate::types::BasketSettings;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "BASKET_";

/// Resolve the path to the settings file (`~/.basket/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".basket").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file is not an error; a malformed one is.
pub fn load_settings_from_path(path: &Path) -> Result<BasketSettings> {
    let mut figment = Figment::from(Serialized::defaults(BasketSettings::default()));
    if path.exists() {
        debug!(?path, "loading settings from file");
        figment = figment.merge(Json::file_exact(path));
    } else {
        debug!(?path, "settings file not found, using defaults");
    }

    let settings: BasketSettings = figment
        .merge(
            Env::prefixed(ENV_PREFIX)
                .split("__")
                .map(|key| env_key_to_path(key.as_str()).into())
                .lowercase(false),
        )
        .extract()?;
    Ok(settings)
}

/// Turn a dotted `SNAKE_CASE` env key into a camelCase settings path.
///
/// `IDENTITY.PROJECT_ID` becomes `identity.projectId`.
pub fn env_key_to_path(key: &str) -> String {
    key.split('.')
        .map(snake_to_camel)
        .collect::<Vec<_>>()
        .join(".")
}

fn snake_to_camel(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut upper_next = false;
    for ch in segment.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch.to_ascii_lowercase());
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
