//! Hosted binding: deliver to sockets held by this process.

use std::sync::Arc;

use async_trait::async_trait;
use basket_core::{BroadcastPayload, Topic};
use basket_settings::BroadcastMode;
use tracing::debug;

use super::Broadcaster;
use crate::errors::BroadcastError;
use crate::topics::TopicHub;

/// Fans events out through the in-process [`TopicHub`].
///
/// The payload is serialized once and shared by every subscriber queue.
/// Subscribers whose device id equals the initiator are skipped.
#[derive(Debug, Clone)]
pub struct HostedBroadcaster {
    hub: Arc<TopicHub>,
}

impl HostedBroadcaster {
    /// Broadcaster over `hub`.
    pub fn new(hub: Arc<TopicHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl Broadcaster for HostedBroadcaster {
    async fn broadcast(&self, topic: &Topic, payload: &BroadcastPayload) -> Result<(), BroadcastError> {
        let message = Arc::new(payload.to_json()?);
        let report = self
            .hub
            .deliver(topic, &message, payload.initiator.as_deref());
        debug!(
            topic = %topic,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "hosted fan-out"
        );
        Ok(())
    }

    fn mode(&self) -> BroadcastMode {
        BroadcastMode::Hosted
    }
}
