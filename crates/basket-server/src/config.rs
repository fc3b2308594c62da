//! Server configuration.

use basket_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration for the basket server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Outbound queue depth per subscriber connection.
    pub max_send_queue: usize,
    /// Ping interval in seconds; a subscriber silent for two intervals is dropped.
    pub heartbeat_interval_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// How long shutdown waits for connections and broadcasts, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_send_queue: 256,
            heartbeat_interval_secs: 30,
            max_message_size: 64 * 1024,
            shutdown_timeout_secs: 10,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_send_queue: settings.max_send_queue.max(1),
            heartbeat_interval_secs: settings.heartbeat_interval_secs.max(1),
            max_message_size: settings.max_message_size,
            shutdown_timeout_secs: settings.shutdown_timeout_secs,
        }
    }
}

impl ServerConfig {
    /// `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_on_any_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn from_settings() {
        let settings = ServerSettings {
            host: "0.0.0.0".into(),
            port: 8080,
            max_send_queue: 0,
            heartbeat_interval_secs: 0,
            ..ServerSettings::default()
        };
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
        assert_eq!(cfg.max_send_queue, 1);
        assert_eq!(cfg.heartbeat_interval_secs, 1);
        assert_eq!(cfg.max_message_size, settings.max_message_size);
    }
}
