//! Error types and their HTTP mapping.
//!
//! Every error response body is `{"error": "<message>"}`. Messages never
//! carry token contents or internal details.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use basket_auth::AuthError;
use serde_json::json;
use thiserror::Error;

/// The external relay refused or failed a request.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The relay answered with a non-success status.
    #[error("relay rejected request ({status}): {body}")]
    Rejected {
        /// HTTP status from the relay.
        status: u16,
        /// Response body, as text.
        body: String,
    },
    /// The request never got an answer.
    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The relay answered 2xx with a body we could not use.
    #[error("relay returned an unusable response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Relay status, when the relay answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            Self::InvalidResponse(_) => None,
        }
    }
}

/// A broadcast could not be delivered. Logged, never surfaced to clients.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// The payload could not be serialized.
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The relay refused the fan-out call.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// List/item store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The list does not exist.
    #[error("list not found")]
    ListNotFound,
    /// The item does not exist.
    #[error("item not found")]
    ItemNotFound,
    /// The backing store failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned from HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No `Authorization: Bearer` header.
    #[error("missing bearer token")]
    MissingToken,
    /// Token verification failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),
    /// Caller may not subscribe to (or get a ticket for) this list.
    #[error("list not found")]
    NotAuthorized,
    /// The list is unknown or belongs to someone else (CRUD routes).
    #[error("List not found")]
    ListNotFound,
    /// Anything else that does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The relay refused to issue a ticket.
    #[error("ticket issuance failed: {0}")]
    Upstream(#[from] UpstreamError),
    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    /// HTTP status for this error.
    ///
    /// - Missing/invalid token, key fetch failure: 401
    /// - Bad request, not authorized for a list: 400
    /// - Unknown list/item: 404
    /// - Relay rejection: 502
    /// - Store failure: 500
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::NotAuthorized => StatusCode::BAD_REQUEST,
            Self::ListNotFound | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Store(StoreError::ListNotFound | StoreError::ItemNotFound) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Unavailable(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Auth(AuthError::TokenInvalid(_)) => "invalid token".into(),
            Self::Auth(AuthError::KeyFetch(_)) => "unable to verify token".into(),
            Self::Upstream(err) => match err.status() {
                Some(status) => format!("ticket issuance failed (relay status {status})"),
                None => "ticket issuance failed".into(),
            },
            Self::Store(StoreError::ListNotFound) => "List not found".into(),
            Self::Store(StoreError::ItemNotFound) => "Item not found".into(),
            Self::Store(StoreError::Unavailable(_)) => "internal error".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
