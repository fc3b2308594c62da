//! List mutation events and their broadcast envelope.
//!
//! A [`MutationEvent`] is built by a CRUD handler after a change is committed,
//! consumed once by a broadcaster and then discarded. On the wire every
//! transport sends the same [`BroadcastPayload`]:
//!
//! ```json
//! {"type": "ListItemCrossed", "data": {"itemId": "x1", "crossed": true}, "initiator": "userB"}
//! ```

use serde::{Deserialize, Serialize};

use crate::ids::ItemId;
use crate::records::{Item, ListItem};

/// A change to a list's contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MutationEvent {
    /// An item was added (or its count bumped); carries the full entry set.
    #[serde(rename = "ListItemAdded", rename_all = "camelCase")]
    ItemAdded {
        /// Entries of the list after the addition.
        list_items: Vec<ListItem>,
        /// The item that was added.
        added_item: Item,
    },
    /// Items were taken off the list.
    #[serde(rename = "ListItemsRemoved", rename_all = "camelCase")]
    ItemsRemoved {
        /// Removed item ids.
        item_ids: Vec<ItemId>,
    },
    /// An entry was crossed off or restored.
    #[serde(rename = "ListItemCrossed", rename_all = "camelCase")]
    ItemCrossed {
        /// The entry's item id.
        item_id: ItemId,
        /// New crossed state.
        crossed: bool,
    },
    /// An item was deleted altogether.
    #[serde(rename = "ItemDeleted", rename_all = "camelCase")]
    ItemDeleted {
        /// The deleted item.
        item_id: ItemId,
    },
}

impl MutationEvent {
    /// Wire name of the event, as it appears in the `type` field.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ItemAdded { .. } => "ListItemAdded",
            Self::ItemsRemoved { .. } => "ListItemsRemoved",
            Self::ItemCrossed { .. } => "ListItemCrossed",
            Self::ItemDeleted { .. } => "ItemDeleted",
        }
    }

    /// Wrap the event for delivery, stamping who caused it.
    #[must_use]
    pub fn into_payload(self, initiator: Option<String>) -> BroadcastPayload {
        BroadcastPayload {
            event: self,
            initiator,
        }
    }
}

/// Wire envelope: the tagged event plus its initiator.
///
/// `initiator` lets receivers drop echoes of their own actions; it is
/// omitted when unknown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastPayload {
    /// The event (`type` + `data`).
    #[serde(flatten)]
    pub event: MutationEvent,
    /// Subject or device id of the caller that triggered the mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator: Option<String>,
}

impl BroadcastPayload {
    /// Serialize to the JSON text sent to subscribers.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
