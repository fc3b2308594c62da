//! Event fan-out.
//!
//! [`Broadcaster`] is the single delivery contract; [`HostedBroadcaster`]
//! delivers to sockets this process holds, [`GatewayClient`] hands events to
//! an external relay. Handlers never await delivery: they go through
//! [`BroadcastNotifier`], which runs each broadcast as a detached task.

pub mod gateway;
pub mod hosted;

use std::sync::Arc;

use async_trait::async_trait;
use basket_core::{BroadcastPayload, ListId, MutationEvent, Topic};
use basket_settings::BroadcastMode;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::errors::BroadcastError;

pub use gateway::GatewayClient;
pub use hosted::HostedBroadcaster;

/// Delivers a payload to every subscriber of a topic, best effort.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Fan `payload` out to `topic`.
    async fn broadcast(&self, topic: &Topic, payload: &BroadcastPayload) -> Result<(), BroadcastError>;

    /// Which binding this is.
    fn mode(&self) -> BroadcastMode;
}

/// Schedules broadcasts off the request path.
#[derive(Clone)]
pub struct BroadcastNotifier {
    broadcaster: Arc<dyn Broadcaster>,
    tracker: TaskTracker,
}

impl BroadcastNotifier {
    /// Notifier spawning onto `tracker`, so shutdown can wait for in-flight sends.
    pub fn new(broadcaster: Arc<dyn Broadcaster>, tracker: TaskTracker) -> Self {
        Self { broadcaster, tracker }
    }

    /// The underlying binding.
    pub fn mode(&self) -> BroadcastMode {
        self.broadcaster.mode()
    }

    /// Broadcast `event` to `list_id`'s topic in the background.
    ///
    /// Failures are logged and dropped; the returned handle is only useful
    /// to tests.
    pub fn notify(&self, list_id: &ListId, event: MutationEvent, initiator: Option<String>) -> JoinHandle<()> {
        let topic = Topic::for_list(list_id);
        let payload = event.into_payload(initiator);
        let broadcaster = Arc::clone(&self.broadcaster);
        self.tracker.spawn(async move {
            let event_type = payload.event.event_type();
            match broadcaster.broadcast(&topic, &payload).await {
                Ok(()) => debug!(topic = %topic, event_type, "event broadcast"),
                Err(err) => warn!(topic = %topic, event_type, error = %err, "broadcast failed"),
            }
        })
    }
}

impl std::fmt::Debug for BroadcastNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastNotifier")
            .field("mode", &self.mode())
            .field("in_flight", &self.tracker.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_core::ItemId;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingBroadcaster {
        seen: Mutex<Vec<(Topic, BroadcastPayload)>>,
        fail: bool,
    }

    #[async_trait]
    impl Broadcaster for RecordingBroadcaster {
        async fn broadcast(&self, topic: &Topic, payload: &BroadcastPayload) -> Result<(), BroadcastError> {
            self.seen.lock().push((topic.clone(), payload.clone()));
            if self.fail {
                return Err(BroadcastError::Upstream(crate::errors::UpstreamError::InvalidResponse(
                    "boom".into(),
                )));
            }
            Ok(())
        }

        fn mode(&self) -> BroadcastMode {
            BroadcastMode::Hosted
        }
    }

    #[tokio::test]
    async fn notify_broadcasts_to_list_topic() {
        let recorder = Arc::new(RecordingBroadcaster::default());
        let notifier = BroadcastNotifier::new(recorder.clone(), TaskTracker::new());
        let event = MutationEvent::ItemCrossed {
            item_id: ItemId::from("x1"),
            crossed: true,
        };
        notifier
            .notify(&ListId::from("abc"), event.clone(), Some("userB".into()))
            .await
            .unwrap();

        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_str(), "LIST:abc");
        assert_eq!(seen[0].1.event, event);
        assert_eq!(seen[0].1.initiator.as_deref(), Some("userB"));
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let recorder = Arc::new(RecordingBroadcaster {
            fail: true,
            ..RecordingBroadcaster::default()
        });
        let notifier = BroadcastNotifier::new(recorder.clone(), TaskTracker::new());
        let handle = notifier.notify(
            &ListId::from("abc"),
            MutationEvent::ItemDeleted { item_id: ItemId::from("i1") },
            None,
        );
        assert!(handle.await.is_ok());
        assert_eq!(recorder.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn tracker_sees_in_flight_work() {
        let tracker = TaskTracker::new();
        let notifier = BroadcastNotifier::new(Arc::new(RecordingBroadcaster::default()), tracker.clone());
        let _ = notifier.notify(
            &ListId::from("abc"),
            MutationEvent::ItemsRemoved { item_ids: vec![] },
            None,
        );
        tracker.close();
        tracker.wait().await;
        assert!(tracker.is_empty());
    }
}
