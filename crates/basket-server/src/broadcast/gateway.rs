//! Gateway binding: an external relay owns the sockets.
//!
//! Relay API (all calls carry the app's API key in `Authorization`):
//! - `POST {base}/api/app/{appId}/ticket` `{userId, topic}` → `{token}`
//! - `POST {base}/api/app/{appId}/topic/{topic}/broadcast` `{payload}`
//! - clients connect to `{base as ws(s)}/ws/app/{appId}/topic/{topic}`

use std::time::Duration;

use async_trait::async_trait;
use basket_core::{BroadcastPayload, CallerIdentity, Topic};
use basket_settings::{BroadcastMode, GatewaySettings};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::Broadcaster;
use crate::errors::{BroadcastError, UpstreamError};
use crate::ticket::{Ticket, TicketIssuer};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TicketRequest<'a> {
    user_id: &'a str,
    topic: &'a Topic,
}

#[derive(Deserialize)]
struct TicketResponse {
    token: String,
}

#[derive(Serialize)]
struct BroadcastRequest<'a> {
    payload: &'a BroadcastPayload,
}

/// HTTP client for the relay. Both a [`Broadcaster`] and a [`TicketIssuer`].
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    api_key: String,
    ticket_ttl_secs: i64,
}

impl GatewayClient {
    /// Build a client from relay settings.
    pub fn new(settings: &GatewaySettings) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(http, settings))
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, settings: &GatewaySettings) -> Self {
        Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            app_id: settings.app_id.clone(),
            api_key: settings.api_key.clone(),
            ticket_ttl_secs: settings.ticket_ttl_secs,
        }
    }

    fn app_url(&self, path: &str) -> String {
        format!("{}/api/app/{}{path}", self.base_url, self.app_id)
    }

    async fn post<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<reqwest::Response, UpstreamError> {
        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, &self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "relay rejected request");
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("api_key", &"[redacted]")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Broadcaster for GatewayClient {
    #[instrument(skip_all, fields(topic = %topic, event_type = payload.event.event_type()))]
    async fn broadcast(&self, topic: &Topic, payload: &BroadcastPayload) -> Result<(), BroadcastError> {
        let url = self.app_url(&format!("/topic/{topic}/broadcast"));
        let _ = self.post(&url, &BroadcastRequest { payload }).await?;
        Ok(())
    }

    fn mode(&self) -> BroadcastMode {
        BroadcastMode::Gateway
    }
}

#[async_trait]
impl TicketIssuer for GatewayClient {
    #[instrument(skip_all, fields(topic = %topic, subject = %identity.subject_id))]
    async fn issue_ticket(&self, identity: &CallerIdentity, topic: &Topic) -> Result<Ticket, UpstreamError> {
        let issued_at = chrono::Utc::now().timestamp();
        let request = TicketRequest {
            user_id: &identity.subject_id,
            topic,
        };
        let response = self.post(&self.app_url("/ticket"), &request).await?;
        let TicketResponse { token } = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        Ok(Ticket {
            token,
            bound_topic: topic.clone(),
            bound_subject: identity.subject_id.clone(),
            expires_at: issued_at + self.ticket_ttl_secs,
        })
    }

    fn connection_url(&self, topic: &Topic) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}/ws/app/{}/topic/{topic}", self.app_id)
    }
}
