//! Identity token issuer settings.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Issuer URL prefix of the secure-token service.
pub const DEFAULT_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Public signing certificates of the secure-token service.
pub const DEFAULT_KEYS_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

/// Where identity tokens come from and how their keys are cached.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentitySettings {
    /// Project id; the required token audience.
    pub project_id: String,
    /// Issuer prefix; the required issuer is this plus the project id.
    pub issuer_prefix: String,
    /// Key metadata endpoint.
    pub keys_url: String,
    /// Key set lifetime when the endpoint sends no cache directive.
    pub default_key_ttl_secs: i64,
    /// Minimum key set age before an unknown key id may force a refresh.
    pub min_key_refresh_secs: i64,
    /// Key fetch timeout.
    pub fetch_timeout_secs: u64,
}

impl IdentitySettings {
    /// Issuer URL tokens must carry.
    #[must_use]
    pub fn expected_issuer(&self) -> String {
        format!("{}{}", self.issuer_prefix, self.project_id)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.default_key_ttl_secs < 0 {
            return Err(SettingsError::InvalidValue(format!(
                "identity.defaultKeyTtlSecs must not be negative, got {}",
                self.default_key_ttl_secs
            )));
        }
        if self.min_key_refresh_secs < 0 {
            return Err(SettingsError::InvalidValue(format!(
                "identity.minKeyRefreshSecs must not be negative, got {}",
                self.min_key_refresh_secs
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "identity.fetchTimeoutSecs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            issuer_prefix: DEFAULT_ISSUER_PREFIX.to_string(),
            keys_url: DEFAULT_KEYS_URL.to_string(),
            default_key_ttl_secs: 3_600,
            min_key_refresh_secs: 60,
            fetch_timeout_secs: 10,
        }
    }
}
