//! `GET /api/events/ws` upgrade handler.
//!
//! - missing `listId` → 400 before upgrade
//! - missing or invalid token → upgrade, send `{"error": ...}`, close 1009
//! - valid token for a list the caller does not own → 400 before upgrade
//! - otherwise → subscribed session

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Query, State};
use axum::response::Response;
use basket_core::{ListId, Topic};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::session::{SessionParams, run_subscriber_session};
use crate::errors::ApiError;
use crate::server::AppState;

/// Query parameters of the upgrade request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeQuery {
    /// List to subscribe to.
    pub list_id: Option<String>,
    /// Identity token.
    pub id_token: Option<String>,
    /// Device id, used to skip echoes of this device's own changes.
    pub client_id: Option<String>,
}

/// Authorize and upgrade a subscriber connection.
pub async fn subscribe_handler(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let list_id = query
        .list_id
        .filter(|id| !id.is_empty())
        .map(ListId::from)
        .ok_or_else(|| ApiError::BadRequest("missing listId".into()))?;
    let Some(hub) = state.hub.clone() else {
        return Err(ApiError::NotFound("hosted subscriptions are not enabled".into()));
    };
    let ws = ws.max_message_size(state.config.max_message_size);

    let verified = match query.id_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => state.verifier.verify(token).await.map_err(ApiError::from),
        None => Err(ApiError::MissingToken),
    };
    let identity = match verified {
        Ok(identity) => identity,
        Err(err) => {
            info!(list_id = %list_id, error = %err, "rejecting subscriber");
            let reason = err.public_message();
            return Ok(ws.on_upgrade(move |socket| reject_socket(socket, reason)));
        }
    };

    if state.store.get_list(&identity.subject_id, &list_id).await?.is_none() {
        return Err(ApiError::NotAuthorized);
    }

    let params = SessionParams {
        hub,
        topic: Topic::for_list(&list_id),
        subscriber_id: identity.subject_id,
        client_id: query.client_id.filter(|id| !id.is_empty()),
        max_send_queue: state.config.max_send_queue,
        heartbeat_interval: Duration::from_secs(state.config.heartbeat_interval_secs),
        shutdown: state.shutdown.token(),
    };
    let tracker = state.shutdown.tracker();
    Ok(ws
        .on_failed_upgrade(|err| warn!(error = %err, "websocket upgrade failed"))
        .on_upgrade(move |socket| async move {
            tracker.track_future(run_subscriber_session(socket, params)).await;
        }))
}

async fn reject_socket(mut socket: WebSocket, reason: String) {
    let frame = json!({ "error": &reason }).to_string();
    let _ = socket.send(Message::Text(frame.into())).await;
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::SIZE,
            reason: reason.into(),
        })))
        .await;
}
