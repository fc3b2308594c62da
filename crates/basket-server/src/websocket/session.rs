//! Subscriber session lifecycle, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use basket_core::{ConnectionId, Topic};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::topics::{SubscriberConnection, SubscriptionGuard, TopicHub};

/// Close reason sent when the subscribed list is deleted.
pub const LIST_DELETED_REASON: &str = "list deleted";

/// Everything a session needs once the caller is authorized.
#[derive(Debug)]
pub struct SessionParams {
    /// Hub to subscribe into.
    pub hub: Arc<TopicHub>,
    /// Topic of the authorized list.
    pub topic: Topic,
    /// Verified subject.
    pub subscriber_id: String,
    /// Device id from the handshake.
    pub client_id: Option<String>,
    /// Outbound queue depth.
    pub max_send_queue: usize,
    /// Ping interval.
    pub heartbeat_interval: Duration,
    /// Server shutdown signal.
    pub shutdown: CancellationToken,
}

/// Run one subscriber socket until it closes.
///
/// 1. Subscribes the connection to its topic
/// 2. Forwards queued events to the socket and pings every heartbeat
/// 3. Drops clients silent for two heartbeats
/// 4. Ignores client text; a close frame or read error ends the session
/// 5. On shutdown sends close code 1001
/// 6. When the list is deleted sends close code 1008
///
/// The subscription is held by a guard, so it is removed however this
/// future ends, including cancellation.
#[instrument(skip_all, fields(topic = %params.topic, subscriber = %params.subscriber_id))]
pub async fn run_subscriber_session(socket: WebSocket, params: SessionParams) {
    let SessionParams {
        hub,
        topic,
        subscriber_id,
        client_id,
        max_send_queue,
        heartbeat_interval,
        shutdown,
    } = params;

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(max_send_queue.max(1));
    let connection = Arc::new(SubscriberConnection::new(ConnectionId::new(), client_id, send_tx));
    let guard = SubscriptionGuard::subscribe(hub, &topic, Arc::clone(&connection), &subscriber_id);
    info!(connection_id = %connection.id, "subscriber connected");

    let idle_limit = heartbeat_interval * 2;
    let writer = async {
        let mut ping_interval = tokio::time::interval(heartbeat_interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    let _ = ws_tx
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::AWAY,
                            reason: "server shutting down".into(),
                        })))
                        .await;
                    break;
                }
                () = connection.revoked() => {
                    info!("list deleted, closing subscriber");
                    let _ = ws_tx
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::POLICY,
                            reason: LIST_DELETED_REASON.into(),
                        })))
                        .await;
                    break;
                }
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if connection.idle_for() > idle_limit {
                        warn!("subscriber unresponsive for {idle_limit:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    };

    let reader = async {
        while let Some(Ok(msg)) = ws_rx.next().await {
            connection.mark_alive();
            match msg {
                Message::Close(_) => {
                    debug!("client sent close frame");
                    break;
                }
                Message::Text(_) | Message::Binary(_) => debug!("ignoring client frame"),
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    };

    tokio::select! {
        () = writer => {}
        () = reader => {}
    }

    drop(guard);
    info!(
        connection_id = %connection.id,
        dropped = connection.drop_count(),
        "subscriber disconnected"
    );
}
