//! Per-topic subscriber registry.

use std::collections::HashMap;
use std::sync::Arc;

use basket_core::{ConnectionId, Topic};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::warn;

use super::connection::SubscriberConnection;

/// Proof of a subscription, returned by [`TopicRegistry::subscribe`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionHandle {
    /// Topic subscribed to.
    pub topic: Topic,
    /// The subscribed connection.
    pub connection_id: ConnectionId,
    /// Verified subject that opened the subscription.
    pub subscriber_id: String,
}

/// Snapshot of one live subscription.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    /// Connection id.
    pub connection_id: ConnectionId,
    /// Verified subject.
    pub subscriber_id: String,
    /// Announced device id, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Seconds since the connection was opened.
    pub connected_secs: u64,
}

/// Outcome of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Frames queued.
    pub delivered: usize,
    /// Subscribers skipped because they initiated the change.
    pub skipped: usize,
    /// Subscribers whose queue was full or closed.
    pub failed: usize,
}

struct Subscription {
    connection: Arc<SubscriberConnection>,
    subscriber_id: String,
}

/// The live subscribers of one topic.
pub struct TopicRegistry {
    topic: Topic,
    subscribers: RwLock<HashMap<ConnectionId, Subscription>>,
}

impl TopicRegistry {
    /// Empty registry for `topic`.
    pub fn new(topic: Topic) -> Self {
        Self {
            topic,
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection. Re-subscribing the same connection replaces it.
    pub fn subscribe(
        &self,
        connection: Arc<SubscriberConnection>,
        subscriber_id: &str,
    ) -> SubscriptionHandle {
        let handle = SubscriptionHandle {
            topic: self.topic.clone(),
            connection_id: connection.id.clone(),
            subscriber_id: subscriber_id.to_owned(),
        };
        let _ = self.subscribers.write().insert(
            connection.id.clone(),
            Subscription {
                connection,
                subscriber_id: subscriber_id.to_owned(),
            },
        );
        handle
    }

    /// Remove a connection. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, connection_id: &ConnectionId) -> bool {
        self.subscribers.write().remove(connection_id).is_some()
    }

    /// Live subscription count.
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Whether nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Snapshot of current subscriptions, oldest first.
    pub fn list_subscriptions(&self) -> Vec<SubscriptionInfo> {
        let mut infos: Vec<SubscriptionInfo> = self
            .subscribers
            .read()
            .values()
            .map(|sub| SubscriptionInfo {
                connection_id: sub.connection.id.clone(),
                subscriber_id: sub.subscriber_id.clone(),
                client_id: sub.connection.client_id().map(str::to_owned),
                connected_secs: sub.connection.connected_at.elapsed().as_secs(),
            })
            .collect();
        infos.sort_by(|a, b| b.connected_secs.cmp(&a.connected_secs));
        infos
    }

    /// Drop every subscription and signal each session to close.
    pub fn revoke_all(&self) -> usize {
        let revoked: Vec<Subscription> = self.subscribers.write().drain().map(|(_, sub)| sub).collect();
        for sub in &revoked {
            sub.connection.revoke();
        }
        revoked.len()
    }

    /// Queue `message` on every subscriber except those whose device id
    /// equals `skip_client`.
    ///
    /// Works on a snapshot so no lock is held while sending. A failing
    /// subscriber never affects the others.
    pub fn deliver(&self, message: &Arc<String>, skip_client: Option<&str>) -> DeliveryReport {
        let targets: Vec<Arc<SubscriberConnection>> = self
            .subscribers
            .read()
            .values()
            .map(|sub| Arc::clone(&sub.connection))
            .collect();

        let mut report = DeliveryReport::default();
        for connection in targets {
            if skip_client.is_some() && connection.client_id() == skip_client {
                report.skipped += 1;
                continue;
            }
            if connection.send(Arc::clone(message)) {
                report.delivered += 1;
            } else {
                report.failed += 1;
                warn!(
                    topic = %self.topic,
                    connection_id = %connection.id,
                    dropped = connection.drop_count(),
                    "subscriber queue full or closed, event dropped"
                );
            }
        }
        report
    }
}

impl std::fmt::Debug for TopicRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRegistry")
            .field("topic", &self.topic)
            .field("subscribers", &self.len())
            .finish()
    }
}
