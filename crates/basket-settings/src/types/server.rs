//! Listener settings.

use serde::{Deserialize, Serialize};

/// HTTP/WebSocket listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (0 picks a free port).
    pub port: u16,
    /// Outbound messages buffered per connection before sends start failing.
    pub max_send_queue: usize,
    /// Interval between server pings on live sockets, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Largest inbound WebSocket message accepted, in bytes.
    pub max_message_size: usize,
    /// How long shutdown waits for connections to drain, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            max_send_queue: 256,
            heartbeat_interval_secs: 30,
            max_message_size: 64 * 1024,
            shutdown_timeout_secs: 10,
        }
    }
}
