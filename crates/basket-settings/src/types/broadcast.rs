//! Broadcast transport settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Default relay base URL.
pub const DEFAULT_GATEWAY_URL: &str = "https://ws-gateway.fly.dev";

/// Which transport carries list events to clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastMode {
    /// This process terminates client sockets.
    #[default]
    Hosted,
    /// An external relay holds the sockets; this process issues tickets and
    /// posts events to it.
    Gateway,
}

impl BroadcastMode {
    /// Lowercase name as used in config.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Gateway => "gateway",
        }
    }
}

impl fmt::Display for BroadcastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BroadcastMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" => Ok(Self::Hosted),
            "gateway" => Ok(Self::Gateway),
            other => Err(SettingsError::InvalidValue(format!(
                "unknown broadcast mode: {other}"
            ))),
        }
    }
}

/// Transport selection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BroadcastSettings {
    /// Active transport.
    pub mode: BroadcastMode,
    /// Relay settings, used in gateway mode.
    pub gateway: GatewaySettings,
}

/// External relay settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// Relay base URL (`https://...`); socket URLs use the `wss` form.
    pub base_url: String,
    /// Application id registered with the relay.
    pub app_id: String,
    /// Relay API key, sent in the `Authorization` header.
    pub api_key: String,
    /// Assumed ticket lifetime, in seconds. The relay enforces the real one.
    pub ticket_ttl_secs: i64,
    /// Relay request timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl GatewaySettings {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "broadcast.gateway.appId must be set in gateway mode".into(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "broadcast.gateway.apiKey must be set in gateway mode".into(),
            ));
        }
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(SettingsError::InvalidValue(format!(
                "broadcast.gateway.baseUrl must be an http(s) URL, got {}",
                self.base_url
            )));
        }
        if self.ticket_ttl_secs < 0 {
            return Err(SettingsError::InvalidValue(format!(
                "broadcast.gateway.ticketTtlSecs must not be negative, got {}",
                self.ticket_ttl_secs
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "broadcast.gateway.requestTimeoutSecs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            app_id: String::new(),
            api_key: String::new(),
            ticket_ttl_secs: 60,
            request_timeout_secs: 10,
        }
    }
}

impl fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("api_key", &"<redacted>")
            .field("ticket_ttl_secs", &self.ticket_ttl_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
