//! # basket-settings
//!
//! Configuration for the basket server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`BasketSettings::default()`]
//! 2. **User file**: `~/.basket/settings.json` (or an explicit path)
//! 3. **Environment variables**: `BASKET_*` overrides (highest priority),
//!    sections separated by `__`, e.g. `BASKET_IDENTITY__PROJECT_ID`
//!
//! Call [`BasketSettings::validate`] once all overrides are applied.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{ENV_PREFIX, env_key_to_path, load_settings_from_path, settings_path};
pub use types::*;
