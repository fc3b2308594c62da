//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so partial
//! JSON is fine: missing fields keep their compiled default.

mod broadcast;
mod identity;
mod server;

pub use broadcast::*;
pub use identity::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the basket server.
///
/// # JSON Format
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "identity": { "projectId": "my-project" },
///   "broadcast": { "mode": "gateway", "gateway": { "appId": "app", "apiKey": "..." } }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasketSettings {
    /// HTTP/WebSocket listener settings.
    pub server: ServerSettings,
    /// Identity token issuer settings.
    pub identity: IdentitySettings,
    /// Broadcast transport selection.
    pub broadcast: BroadcastSettings,
    /// Logging output.
    pub logging: LoggingSettings,
}

impl BasketSettings {
    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.identity.project_id.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "identity.projectId must be set".into(),
            ));
        }
        if self.server.max_send_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxSendQueue must be at least 1".into(),
            ));
        }
        self.identity.validate()?;
        if self.broadcast.mode == BroadcastMode::Gateway {
            self.broadcast.gateway.validate()?;
        }
        Ok(())
    }
}

/// Logging output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (`RUST_LOG` wins when set).
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> BasketSettings {
        let mut settings = BasketSettings::default();
        settings.identity.project_id = "basket-prod".into();
        settings
    }

    #[test]
    fn defaults() {
        let settings = BasketSettings::default();
        assert_eq!(settings.server.port, 8787);
        assert_eq!(settings.broadcast.mode, BroadcastMode::Hosted);
        assert_eq!(settings.logging.level, "info");
        assert!(!settings.logging.json);
    }

    #[test]
    fn empty_project_id_rejected() {
        let err = BasketSettings::default().validate().unwrap_err();
        assert!(err.to_string().contains("projectId"));
    }

    #[test]
    fn hosted_mode_ignores_gateway_credentials() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn gateway_mode_requires_credentials() {
        let mut settings = valid();
        settings.broadcast.mode = BroadcastMode::Gateway;
        assert!(settings.validate().is_err());

        settings.broadcast.gateway.app_id = "app".into();
        settings.broadcast.gateway.api_key = "key".into();
        assert!(settings.validate().is_ok());

        settings.broadcast.gateway.base_url = "ftp://relay".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn identity_durations_checked() {
        let mut settings = valid();
        settings.identity.default_key_ttl_secs = -1;
        assert!(settings.validate().unwrap_err().to_string().contains("defaultKeyTtlSecs"));

        let mut settings = valid();
        settings.identity.min_key_refresh_secs = -5;
        assert!(settings.validate().is_err());

        let mut settings = valid();
        settings.identity.fetch_timeout_secs = 0;
        assert!(settings.validate().unwrap_err().to_string().contains("fetchTimeoutSecs"));

        let mut settings = valid();
        settings.identity.default_key_ttl_secs = 0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn gateway_durations_checked() {
        let mut settings = valid();
        settings.broadcast.mode = BroadcastMode::Gateway;
        settings.broadcast.gateway.app_id = "app".into();
        settings.broadcast.gateway.api_key = "key".into();
        assert!(settings.validate().is_ok());

        settings.broadcast.gateway.ticket_ttl_secs = -60;
        assert!(settings.validate().unwrap_err().to_string().contains("ticketTtlSecs"));

        settings.broadcast.gateway.ticket_ttl_secs = 60;
        settings.broadcast.gateway.request_timeout_secs = 0;
        assert!(settings.validate().unwrap_err().to_string().contains("requestTimeoutSecs"));
    }

    #[test]
    fn zero_send_queue_rejected() {
        let mut settings = valid();
        settings.server.max_send_queue = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: BasketSettings =
            serde_json::from_str(r#"{"server": {"port": 9000}, "identity": {"projectId": "p"}}"#).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.identity.project_id, "p");
        assert_eq!(settings.identity.default_key_ttl_secs, 3_600);
    }
}
