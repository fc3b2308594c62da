//! List and item records as exchanged with clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ItemId, ListId};

/// A named product owned by one user, reusable across that user's lists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Item id.
    pub id: ItemId,
    /// Owning user (subject id).
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// An item's membership in a list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    /// List the item belongs to.
    pub list_id: ListId,
    /// The item.
    pub item_id: ItemId,
    /// Denormalized item name.
    pub item_name: String,
    /// How many times the item was added.
    pub count: u32,
    /// Whether the item has been crossed off.
    pub crossed: bool,
    /// When the item was first added to the list.
    pub created_at: DateTime<Utc>,
    /// Last change to this entry.
    pub updated_at: DateTime<Utc>,
}

/// A shopping list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    /// List id.
    pub id: ListId,
    /// Owning user (subject id).
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Current entries.
    pub items: Vec<ListItem>,
}
