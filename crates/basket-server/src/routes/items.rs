//! `/api/items` routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use basket_core::{ItemId, MutationEvent};
use tracing::info;

use crate::context::RequestContext;
use crate::errors::{ApiError, StoreError};
use crate::server::AppState;

/// `DELETE /api/items/{id}`: delete the item everywhere and broadcast
/// `ItemDeleted` to each list that held it.
pub async fn delete_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(item_id): Path<ItemId>,
) -> Result<StatusCode, ApiError> {
    let lists = state
        .store
        .delete_item(ctx.subject_id(), &item_id)
        .await?
        .ok_or(StoreError::ItemNotFound)?;
    info!(item_id = %item_id, lists = lists.len(), "item deleted");

    let initiator = ctx.initiator();
    for list_id in &lists {
        let _ = state.notifier.notify(
            list_id,
            MutationEvent::ItemDeleted {
                item_id: item_id.clone(),
            },
            Some(initiator.clone()),
        );
    }
    Ok(StatusCode::NO_CONTENT)
}
