//! # basket-core
//!
//! Shared vocabulary for the basket list-sync backend.
//!
//! - **Branded IDs**: `ListId`, `ItemId`, `ConnectionId` as newtypes for type safety
//! - **Topics**: [`Topic`], the broadcast channel derived from a list id
//! - **Identity**: [`CallerIdentity`], the verified claims of a caller
//! - **Events**: [`MutationEvent`] and the [`BroadcastPayload`] wire envelope
//! - **Records**: list, item and list-item records exchanged with clients

#![deny(unsafe_code)]

pub mod events;
pub mod identity;
pub mod ids;
pub mod records;
pub mod topic;

pub use events::{BroadcastPayload, MutationEvent};
pub use identity::CallerIdentity;
pub use ids::{ConnectionId, ItemId, ListId};
pub use records::{Item, List, ListItem};
pub use topic::Topic;
