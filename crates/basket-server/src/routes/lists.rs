//! `/api/lists` routes.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use basket_core::{Item, ItemId, List, ListId, ListItem, MutationEvent, Topic};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiJson, owned_list, validate_name};
use crate::context::RequestContext;
use crate::errors::{ApiError, StoreError};
use crate::server::AppState;

/// `POST /api/lists` body.
#[derive(Debug, Deserialize)]
pub struct CreateListBody {
    /// List name.
    pub name: String,
}

/// `PUT /api/lists/{id}` body.
#[derive(Debug, Deserialize)]
pub struct UpdateListBody {
    /// New list name.
    pub name: String,
}

/// `POST /api/lists/{id}/items` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemBody {
    /// Item name, matched exactly against the caller's existing items.
    pub item_name: String,
}

/// `PATCH /api/lists/{id}/items/delete` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemsBody {
    /// Items to take off the list.
    pub item_ids: Vec<ItemId>,
}

/// `PATCH /api/lists/{id}/items/{itemId}/crossed` body.
#[derive(Debug, Deserialize)]
pub struct CrossItemBody {
    /// New crossed state.
    pub crossed: bool,
}

/// Response of an item add.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAddedResponse {
    /// Entries after the add.
    pub list_items: Vec<ListItem>,
    /// The added item.
    pub added_item: Item,
}

/// `GET /api/lists`
pub async fn get_lists(State(state): State<AppState>, ctx: RequestContext) -> Result<Json<Vec<List>>, ApiError> {
    Ok(Json(state.store.get_lists(ctx.subject_id()).await?))
}

/// `POST /api/lists`
pub async fn create_list(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiJson(body): ApiJson<CreateListBody>,
) -> Result<Json<List>, ApiError> {
    validate_name("name", &body.name)?;
    let list = state.store.create_list(ctx.subject_id(), &body.name).await?;
    info!(list_id = %list.id, "list created");
    Ok(Json(list))
}

/// `PUT /api/lists/{id}`: rename.
pub async fn update_list(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(list_id): Path<ListId>,
    ApiJson(body): ApiJson<UpdateListBody>,
) -> Result<Json<List>, ApiError> {
    validate_name("name", &body.name)?;
    let list = state
        .store
        .update_list(ctx.subject_id(), &list_id, &body.name)
        .await?
        .ok_or(ApiError::ListNotFound)?;
    info!(list_id = %list.id, "list renamed");
    Ok(Json(list))
}

/// `DELETE /api/lists/{id}`: delete the list and close its hosted
/// subscriptions.
pub async fn delete_list(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(list_id): Path<ListId>,
) -> Result<StatusCode, ApiError> {
    if !state.store.delete_list(ctx.subject_id(), &list_id).await? {
        return Err(ApiError::ListNotFound);
    }
    let closed = state
        .hub
        .as_ref()
        .map_or(0, |hub| hub.close_topic(&Topic::for_list(&list_id)));
    info!(%list_id, closed, "list deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/lists/{id}/items`
pub async fn get_list_items(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(list_id): Path<ListId>,
) -> Result<Json<Vec<ListItem>>, ApiError> {
    let list = owned_list(&state, &ctx, &list_id).await?;
    Ok(Json(list.items))
}

/// `POST /api/lists/{id}/items`: add an item (creating it if new) and
/// broadcast `ListItemAdded`.
pub async fn add_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(list_id): Path<ListId>,
    ApiJson(body): ApiJson<AddItemBody>,
) -> Result<Json<ItemAddedResponse>, ApiError> {
    validate_name("itemName", &body.item_name)?;
    let list = owned_list(&state, &ctx, &list_id).await?;

    let item = state
        .store
        .get_or_create_item(ctx.subject_id(), &body.item_name)
        .await?;
    let _ = state.store.add_to_list(&list.id, &item).await?;
    let list_items = state.store.get_list_items(&list.id).await?;

    let _ = state.notifier.notify(
        &list.id,
        MutationEvent::ItemAdded {
            list_items: list_items.clone(),
            added_item: item.clone(),
        },
        Some(ctx.initiator()),
    );
    Ok(Json(ItemAddedResponse {
        list_items,
        added_item: item,
    }))
}

/// `PATCH /api/lists/{id}/items/delete`: broadcast `ListItemsRemoved`.
pub async fn remove_items(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(list_id): Path<ListId>,
    ApiJson(body): ApiJson<RemoveItemsBody>,
) -> Result<StatusCode, ApiError> {
    let list = owned_list(&state, &ctx, &list_id).await?;
    let removed = state.store.remove_from_list(&list.id, &body.item_ids).await?;
    info!(list_id = %list.id, removed, "items removed");

    let _ = state.notifier.notify(
        &list.id,
        MutationEvent::ItemsRemoved {
            item_ids: body.item_ids,
        },
        Some(ctx.initiator()),
    );
    Ok(StatusCode::NO_CONTENT)
}

/// `PATCH /api/lists/{id}/items/{itemId}/crossed`: broadcast `ListItemCrossed`.
pub async fn cross_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((list_id, item_id)): Path<(ListId, ItemId)>,
    ApiJson(body): ApiJson<CrossItemBody>,
) -> Result<StatusCode, ApiError> {
    let list = owned_list(&state, &ctx, &list_id).await?;
    let entry = state
        .store
        .cross_list_item(&list.id, &item_id, body.crossed)
        .await?
        .ok_or(StoreError::ItemNotFound)?;

    let _ = state.notifier.notify(
        &list.id,
        MutationEvent::ItemCrossed {
            item_id: entry.item_id,
            crossed: entry.crossed,
        },
        Some(ctx.initiator()),
    );
    Ok(StatusCode::NO_CONTENT)
}
