//! `/api/events` routes: relay tickets and session diagnostics.

use axum::Json;
use axum::extract::{Query, State};
use basket_core::{ListId, Topic};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::RequestContext;
use crate::errors::ApiError;
use crate::server::AppState;
use crate::topics::SubscriptionInfo;

/// `?listId=` query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Target list.
    pub list_id: Option<String>,
}

/// `POST /api/events/ticket` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    /// Relay socket URL for the list's topic.
    pub ws_url: String,
    /// Ticket to present to the relay.
    pub ticket: String,
}

/// `GET /api/events/sessions` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsResponse {
    /// Target list.
    pub list_id: ListId,
    /// Its topic.
    pub topic: Topic,
    /// Live hosted subscriptions.
    pub sessions: usize,
    /// Per-connection detail.
    pub subscriptions: Vec<SubscriptionInfo>,
}

/// Resolve `?listId=` to a list the caller owns.
///
/// Missing → 400 `missing listId`; unknown or foreign → 400 `list not found`.
async fn authorized_topic(state: &AppState, ctx: &RequestContext, query: ListQuery) -> Result<(ListId, Topic), ApiError> {
    let list_id = query
        .list_id
        .filter(|id| !id.is_empty())
        .map(ListId::from)
        .ok_or_else(|| ApiError::BadRequest("missing listId".into()))?;
    if state.store.get_list(ctx.subject_id(), &list_id).await?.is_none() {
        return Err(ApiError::NotAuthorized);
    }
    let topic = Topic::for_list(&list_id);
    Ok((list_id, topic))
}

/// `POST /api/events/ticket?listId=`
pub async fn issue_ticket(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<TicketResponse>, ApiError> {
    let (list_id, topic) = authorized_topic(&state, &ctx, query).await?;
    let Some(issuer) = state.tickets.as_ref() else {
        return Err(ApiError::NotFound("ticket issuance is not enabled".into()));
    };

    let ticket = issuer.issue_ticket(&ctx.identity, &topic).await?;
    info!(list_id = %list_id, expires_at = ticket.expires_at, "ticket issued");
    Ok(Json(TicketResponse {
        ws_url: issuer.connection_url(&topic),
        ticket: ticket.token,
    }))
}

/// `GET /api/events/sessions?listId=`
pub async fn list_sessions(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let (list_id, topic) = authorized_topic(&state, &ctx, query).await?;
    let subscriptions = state
        .hub
        .as_ref()
        .map(|hub| hub.list_subscriptions(&topic))
        .unwrap_or_default();
    Ok(Json(SessionsResponse {
        list_id,
        topic,
        sessions: subscriptions.len(),
        subscriptions,
    }))
}
