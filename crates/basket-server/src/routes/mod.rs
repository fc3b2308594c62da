//! HTTP route handlers.
//!
//! All routes here sit behind [`require_identity`](crate::context::require_identity).

pub mod events;
pub mod items;
pub mod lists;

use axum::Json;
use axum::extract::{FromRequest, Request};
use axum::extract::rejection::JsonRejection;
use basket_core::{List, ListId};

use crate::context::RequestContext;
use crate::errors::ApiError;
use crate::server::AppState;

/// Longest accepted list or item name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// JSON body extractor whose rejections use the `{"error"}` shape.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// The caller's list, or 404 `List not found`.
pub(crate) async fn owned_list(state: &AppState, ctx: &RequestContext, list_id: &ListId) -> Result<List, ApiError> {
    state
        .store
        .get_list(ctx.subject_id(), list_id)
        .await?
        .ok_or(ApiError::ListNotFound)
}

/// Check a name is 1..=100 characters.
pub(crate) fn validate_name(field: &str, value: &str) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "{field} must be between 1 and {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}
