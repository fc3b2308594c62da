//! Per-request caller context and the bearer-auth middleware.
//!
//! The middleware verifies the bearer token once and stores a
//! [`RequestContext`] in the request extensions; handlers take it as an
//! extractor. Nothing is looked up from ambient state.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use basket_core::CallerIdentity;
use tracing::debug;

use crate::errors::ApiError;
use crate::server::AppState;

/// Header carrying the caller's device id.
pub const CLIENT_ID_HEADER: &str = "client-id";

/// Header carrying the request id (set by the request-id layer).
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Verified caller plus request metadata.
#[derive(Clone, Debug)]
pub struct RequestContext {
    /// Request id, empty if none was assigned.
    pub request_id: String,
    /// Verified caller.
    pub identity: CallerIdentity,
    /// Device id from the `Client-ID` header.
    pub client_id: Option<String>,
}

impl RequestContext {
    /// The caller's subject id.
    pub fn subject_id(&self) -> &str {
        &self.identity.subject_id
    }

    /// Who to name as a broadcast's initiator: the device id when the client
    /// sent one, otherwise the subject id.
    pub fn initiator(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| self.identity.subject_id.clone())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(ApiError::MissingToken)
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Reject requests without a valid bearer token; attach a [`RequestContext`]
/// to the rest.
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = request.headers();
    let token = bearer_token(headers).ok_or(ApiError::MissingToken)?.to_owned();
    let request_id = header_value(headers, REQUEST_ID_HEADER).unwrap_or_default();
    let client_id = header_value(headers, CLIENT_ID_HEADER);

    let identity = state.verifier.verify(&token).await?;
    debug!(request_id, subject = %identity.subject_id, "caller verified");

    let _ = request.extensions_mut().insert(RequestContext {
        request_id,
        identity,
        client_id,
    });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn identity() -> CallerIdentity {
        CallerIdentity {
            subject_id: "user-1".into(),
            email: String::new(),
            email_verified: false,
            issued_at: 0,
            expires_at: 0,
        }
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        let _ = headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        let _ = headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        let _ = headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn initiator_prefers_device_id() {
        let mut ctx = RequestContext {
            request_id: "r1".into(),
            identity: identity(),
            client_id: Some("phone".into()),
        };
        assert_eq!(ctx.initiator(), "phone");
        ctx.client_id = None;
        assert_eq!(ctx.initiator(), "user-1");
        assert_eq!(ctx.subject_id(), "user-1");
    }

    #[test]
    fn blank_header_values_ignored() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CLIENT_ID_HEADER, HeaderValue::from_static("  "));
        assert_eq!(header_value(&headers, CLIENT_ID_HEADER), None);
        let _ = headers.insert(CLIENT_ID_HEADER, HeaderValue::from_static("laptop"));
        assert_eq!(header_value(&headers, CLIENT_ID_HEADER).as_deref(), Some("laptop"));
    }
}
