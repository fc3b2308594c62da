//! Topic → registry map.

use std::sync::Arc;

use basket_core::{ConnectionId, Topic};
use dashmap::DashMap;
use tracing::debug;

use super::connection::SubscriberConnection;
use super::registry::{DeliveryReport, SubscriptionHandle, SubscriptionInfo, TopicRegistry};

/// All live topics of a hosted server.
///
/// A registry is created on the first subscribe to its topic and removed as
/// soon as its last subscriber leaves.
#[derive(Debug, Default)]
pub struct TopicHub {
    topics: DashMap<Topic, Arc<TopicRegistry>>,
}

impl TopicHub {
    /// Empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `connection` to `topic`, creating the registry if needed.
    pub fn subscribe(
        &self,
        topic: &Topic,
        connection: Arc<SubscriberConnection>,
        subscriber_id: &str,
    ) -> SubscriptionHandle {
        // Subscribing under the entry lock keeps a concurrent unsubscribe
        // from removing the registry between lookup and insert.
        let entry = self
            .topics
            .entry(topic.clone())
            .or_insert_with(|| Arc::new(TopicRegistry::new(topic.clone())));
        let handle = entry.subscribe(connection, subscriber_id);
        debug!(topic = %topic, connection_id = %handle.connection_id, "subscribed");
        handle
    }

    /// Remove a subscription. Idempotent; drops the registry once empty.
    pub fn unsubscribe(&self, topic: &Topic, connection_id: &ConnectionId) -> bool {
        let removed = match self.topics.get(topic) {
            Some(registry) => registry.unsubscribe(connection_id),
            None => return false,
        };
        let _ = self.topics.remove_if(topic, |_, registry| registry.is_empty());
        if removed {
            debug!(topic = %topic, connection_id = %connection_id, "unsubscribed");
        }
        removed
    }

    /// Remove `topic` altogether and tell its sessions to close.
    ///
    /// Used when the list behind the topic is deleted. Guards of the closed
    /// sessions later unsubscribe as a no-op.
    pub fn close_topic(&self, topic: &Topic) -> usize {
        let Some((_, registry)) = self.topics.remove(topic) else {
            return 0;
        };
        let closed = registry.revoke_all();
        debug!(topic = %topic, closed, "topic closed");
        closed
    }

    /// Fan `message` out to `topic`. A topic nobody listens to is a no-op.
    pub fn deliver(&self, topic: &Topic, message: &Arc<String>, skip_client: Option<&str>) -> DeliveryReport {
        let registry = self.topics.get(topic).map(|r| Arc::clone(r.value()));
        registry.map_or_else(DeliveryReport::default, |r| r.deliver(message, skip_client))
    }

    /// Subscribers of `topic`.
    pub fn session_count(&self, topic: &Topic) -> usize {
        self.topics.get(topic).map_or(0, |r| r.len())
    }

    /// Snapshot of `topic`'s subscriptions.
    pub fn list_subscriptions(&self, topic: &Topic) -> Vec<SubscriptionInfo> {
        self.topics
            .get(topic)
            .map(|r| r.list_subscriptions())
            .unwrap_or_default()
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Subscriptions across all topics.
    pub fn total_connections(&self) -> usize {
        self.topics.iter().map(|r| r.len()).sum()
    }
}

/// Unsubscribes when dropped, however the session ends.
#[derive(Debug)]
pub struct SubscriptionGuard {
    hub: Arc<TopicHub>,
    handle: SubscriptionHandle,
}

impl SubscriptionGuard {
    /// Subscribe and return a guard owning the subscription.
    pub fn subscribe(
        hub: Arc<TopicHub>,
        topic: &Topic,
        connection: Arc<SubscriberConnection>,
        subscriber_id: &str,
    ) -> Self {
        let handle = hub.subscribe(topic, connection, subscriber_id);
        Self { hub, handle }
    }

    /// The underlying subscription.
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let _ = self
            .hub
            .unsubscribe(&self.handle.topic, &self.handle.connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_core::ListId;
    use tokio::sync::mpsc;

    fn topic(list: &str) -> Topic {
        Topic::for_list(&ListId::from(list))
    }

    fn connection(id: &str) -> (Arc<SubscriberConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(8);
        (Arc::new(SubscriberConnection::new(ConnectionId::from(id), None, tx)), rx)
    }

    #[test]
    fn registry_created_on_first_subscribe() {
        let hub = TopicHub::new();
        assert_eq!(hub.topic_count(), 0);
        let (c, _rx) = connection("c1");
        let _ = hub.subscribe(&topic("l1"), c, "u1");
        assert_eq!(hub.topic_count(), 1);
        assert_eq!(hub.session_count(&topic("l1")), 1);
    }

    #[test]
    fn registry_removed_when_empty() {
        let hub = TopicHub::new();
        let (c1, _rx1) = connection("c1");
        let (c2, _rx2) = connection("c2");
        let _ = hub.subscribe(&topic("l1"), c1, "u1");
        let _ = hub.subscribe(&topic("l1"), c2, "u2");

        assert!(hub.unsubscribe(&topic("l1"), &ConnectionId::from("c1")));
        assert_eq!(hub.topic_count(), 1);
        assert!(hub.unsubscribe(&topic("l1"), &ConnectionId::from("c2")));
        assert_eq!(hub.topic_count(), 0);
        assert!(!hub.unsubscribe(&topic("l1"), &ConnectionId::from("c2")));
    }

    #[tokio::test]
    async fn deliver_is_scoped_to_topic() {
        let hub = TopicHub::new();
        let (c1, mut rx1) = connection("c1");
        let (c2, mut rx2) = connection("c2");
        let _ = hub.subscribe(&topic("l1"), c1, "u1");
        let _ = hub.subscribe(&topic("l2"), c2, "u2");

        let report = hub.deliver(&topic("l1"), &Arc::new("evt".into()), None);
        assert_eq!(report.delivered, 1);
        assert_eq!(&*rx1.recv().await.unwrap(), "evt");
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn deliver_to_unknown_topic_is_noop() {
        let hub = TopicHub::new();
        let report = hub.deliver(&topic("nobody"), &Arc::new("evt".into()), None);
        assert_eq!(report, DeliveryReport::default());
        assert_eq!(hub.topic_count(), 0);
    }

    #[tokio::test]
    async fn close_topic_revokes_only_that_topic() {
        let hub = Arc::new(TopicHub::new());
        let (c1, _rx1) = connection("c1");
        let (c2, _rx2) = connection("c2");
        let guard = SubscriptionGuard::subscribe(Arc::clone(&hub), &topic("l1"), Arc::clone(&c1), "u1");
        let _ = hub.subscribe(&topic("l2"), c2, "u2");

        assert_eq!(hub.close_topic(&topic("l1")), 1);
        c1.revoked().await;
        assert_eq!(hub.session_count(&topic("l1")), 0);
        assert_eq!(hub.session_count(&topic("l2")), 1);

        drop(guard);
        assert_eq!(hub.topic_count(), 1);
        assert_eq!(hub.close_topic(&topic("l1")), 0);
    }

    #[test]
    fn guard_unsubscribes_on_drop() {
        let hub = Arc::new(TopicHub::new());
        let (c, _rx) = connection("c1");
        let guard = SubscriptionGuard::subscribe(Arc::clone(&hub), &topic("l1"), c, "u1");
        assert_eq!(guard.handle().subscriber_id, "u1");
        assert_eq!(hub.total_connections(), 1);
        drop(guard);
        assert_eq!(hub.total_connections(), 0);
        assert_eq!(hub.topic_count(), 0);
    }

    #[test]
    fn concurrent_subscribe_and_unsubscribe() {
        let hub = Arc::new(TopicHub::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let hub = Arc::clone(&hub);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let id = format!("c{i}-{j}");
                        let (tx, _rx) = mpsc::channel(1);
                        let conn = Arc::new(SubscriberConnection::new(ConnectionId::from(id.as_str()), None, tx));
                        let _ = hub.subscribe(&topic("shared"), conn, "u");
                        assert!(hub.unsubscribe(&topic("shared"), &ConnectionId::from(id.as_str())));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(hub.topic_count(), 0);
    }
}
