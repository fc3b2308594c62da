//! In-memory topic subscriptions for hosted mode.
//!
//! The [`TopicHub`] maps each list topic to a [`TopicRegistry`] holding the
//! connections subscribed to it. Registries exist only while they have
//! subscribers.

pub mod connection;
pub mod hub;
pub mod registry;

pub use connection::SubscriberConnection;
pub use hub::{SubscriptionGuard, TopicHub};
pub use registry::{DeliveryReport, SubscriptionHandle, SubscriptionInfo, TopicRegistry};
