//! List and item persistence.
//!
//! Handlers talk to a [`ListStore`]; the server ships with
//! [`MemoryListStore`]. Ownership is enforced by the store's lookups: a list
//! or item that belongs to another user is reported as absent.

use std::collections::HashMap;

use async_trait::async_trait;
use basket_core::{Item, ItemId, List, ListId, ListItem};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::errors::StoreError;

/// Storage for lists, items and their memberships.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Lists owned by `user_id`, oldest first, with their entries.
    async fn get_lists(&self, user_id: &str) -> Result<Vec<List>, StoreError>;

    /// One list, if it exists and belongs to `user_id`.
    async fn get_list(&self, user_id: &str, list_id: &ListId) -> Result<Option<List>, StoreError>;

    /// Create an empty list.
    async fn create_list(&self, user_id: &str, name: &str) -> Result<List, StoreError>;

    /// Rename one of the user's lists. `None` if it is not theirs.
    async fn update_list(&self, user_id: &str, list_id: &ListId, name: &str) -> Result<Option<List>, StoreError>;

    /// Delete one of the user's lists with its entries. `false` if it is
    /// not theirs. Items survive.
    async fn delete_list(&self, user_id: &str, list_id: &ListId) -> Result<bool, StoreError>;

    /// Entries of a list, in insertion order.
    async fn get_list_items(&self, list_id: &ListId) -> Result<Vec<ListItem>, StoreError>;

    /// The user's item with exactly this name, created if missing.
    async fn get_or_create_item(&self, user_id: &str, name: &str) -> Result<Item, StoreError>;

    /// Add an item to a list, or bump its count if already present.
    async fn add_to_list(&self, list_id: &ListId, item: &Item) -> Result<ListItem, StoreError>;

    /// Take items off a list. Returns how many entries were removed.
    async fn remove_from_list(&self, list_id: &ListId, item_ids: &[ItemId]) -> Result<usize, StoreError>;

    /// Set an entry's crossed flag. `None` if the item is not on the list.
    async fn cross_list_item(
        &self,
        list_id: &ListId,
        item_id: &ItemId,
        crossed: bool,
    ) -> Result<Option<ListItem>, StoreError>;

    /// Delete one of the user's items everywhere.
    ///
    /// Returns the lists it was removed from, or `None` if the user has no
    /// such item.
    async fn delete_item(&self, user_id: &str, item_id: &ItemId) -> Result<Option<Vec<ListId>>, StoreError>;
}

#[derive(Clone, Debug)]
struct ListRow {
    id: ListId,
    user_id: String,
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    lists: HashMap<ListId, ListRow>,
    items: HashMap<ItemId, Item>,
    entries: HashMap<ListId, Vec<ListItem>>,
}

impl MemoryState {
    fn assemble(&self, row: &ListRow) -> List {
        List {
            id: row.id.clone(),
            user_id: row.user_id.clone(),
            name: row.name.clone(),
            created_at: row.created_at,
            items: self.entries.get(&row.id).cloned().unwrap_or_default(),
        }
    }
}

/// Process-local [`ListStore`].
#[derive(Debug, Default)]
pub struct MemoryListStore {
    state: RwLock<MemoryState>,
}

impl MemoryListStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListStore for MemoryListStore {
    async fn get_lists(&self, user_id: &str) -> Result<Vec<List>, StoreError> {
        let state = self.state.read();
        let mut rows: Vec<&ListRow> = state.lists.values().filter(|r| r.user_id == user_id).collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows.into_iter().map(|r| state.assemble(r)).collect())
    }

    async fn get_list(&self, user_id: &str, list_id: &ListId) -> Result<Option<List>, StoreError> {
        let state = self.state.read();
        Ok(state
            .lists
            .get(list_id)
            .filter(|r| r.user_id == user_id)
            .map(|r| state.assemble(r)))
    }

    async fn create_list(&self, user_id: &str, name: &str) -> Result<List, StoreError> {
        let row = ListRow {
            id: ListId::new(),
            user_id: user_id.to_owned(),
            name: name.to_owned(),
            created_at: Utc::now(),
        };
        let mut state = self.state.write();
        let list = state.assemble(&row);
        let _ = state.lists.insert(row.id.clone(), row);
        Ok(list)
    }

    async fn update_list(&self, user_id: &str, list_id: &ListId, name: &str) -> Result<Option<List>, StoreError> {
        let mut state = self.state.write();
        let Some(row) = state.lists.get_mut(list_id).filter(|r| r.user_id == user_id) else {
            return Ok(None);
        };
        name.clone_into(&mut row.name);
        let row = row.clone();
        Ok(Some(state.assemble(&row)))
    }

    async fn delete_list(&self, user_id: &str, list_id: &ListId) -> Result<bool, StoreError> {
        let mut state = self.state.write();
        if !state.lists.get(list_id).is_some_and(|r| r.user_id == user_id) {
            return Ok(false);
        }
        let _ = state.lists.remove(list_id);
        let _ = state.entries.remove(list_id);
        Ok(true)
    }

    async fn get_list_items(&self, list_id: &ListId) -> Result<Vec<ListItem>, StoreError> {
        let state = self.state.read();
        if !state.lists.contains_key(list_id) {
            return Err(StoreError::ListNotFound);
        }
        Ok(state.entries.get(list_id).cloned().unwrap_or_default())
    }

    async fn get_or_create_item(&self, user_id: &str, name: &str) -> Result<Item, StoreError> {
        let mut state = self.state.write();
        if let Some(item) = state
            .items
            .values()
            .find(|i| i.user_id == user_id && i.name == name)
        {
            return Ok(item.clone());
        }
        let item = Item {
            id: ItemId::new(),
            user_id: user_id.to_owned(),
            name: name.to_owned(),
            created_at: Utc::now(),
        };
        let _ = state.items.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    async fn add_to_list(&self, list_id: &ListId, item: &Item) -> Result<ListItem, StoreError> {
        let mut state = self.state.write();
        if !state.lists.contains_key(list_id) {
            return Err(StoreError::ListNotFound);
        }
        if !state.items.contains_key(&item.id) {
            return Err(StoreError::ItemNotFound);
        }
        let now = Utc::now();
        let entries = state.entries.entry(list_id.clone()).or_default();
        if let Some(entry) = entries.iter_mut().find(|e| e.item_id == item.id) {
            entry.count += 1;
            entry.updated_at = now;
            return Ok(entry.clone());
        }
        let entry = ListItem {
            list_id: list_id.clone(),
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            count: 1,
            crossed: false,
            created_at: now,
            updated_at: now,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn remove_from_list(&self, list_id: &ListId, item_ids: &[ItemId]) -> Result<usize, StoreError> {
        let mut state = self.state.write();
        if !state.lists.contains_key(list_id) {
            return Err(StoreError::ListNotFound);
        }
        let Some(entries) = state.entries.get_mut(list_id) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.retain(|e| !item_ids.contains(&e.item_id));
        Ok(before - entries.len())
    }

    async fn cross_list_item(
        &self,
        list_id: &ListId,
        item_id: &ItemId,
        crossed: bool,
    ) -> Result<Option<ListItem>, StoreError> {
        let mut state = self.state.write();
        if !state.lists.contains_key(list_id) {
            return Err(StoreError::ListNotFound);
        }
        let entry = state
            .entries
            .get_mut(list_id)
            .and_then(|entries| entries.iter_mut().find(|e| &e.item_id == item_id));
        Ok(entry.map(|e| {
            e.crossed = crossed;
            e.updated_at = Utc::now();
            e.clone()
        }))
    }

    async fn delete_item(&self, user_id: &str, item_id: &ItemId) -> Result<Option<Vec<ListId>>, StoreError> {
        let mut state = self.state.write();
        match state.items.get(item_id) {
            Some(item) if item.user_id == user_id => {}
            _ => return Ok(None),
        }
        let _ = state.items.remove(item_id);

        let mut affected = Vec::new();
        for (list_id, entries) in &mut state.entries {
            let before = entries.len();
            entries.retain(|e| &e.item_id != item_id);
            if entries.len() != before {
                affected.push(list_id.clone());
            }
        }
        affected.sort();
        Ok(Some(affected))
    }
}
