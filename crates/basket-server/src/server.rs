//! `BasketServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request};
use axum::middleware;
use axum::response::Json;
use axum::routing::{delete, get, patch, post, put};
use basket_auth::IdentityVerifier;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::broadcast::{BroadcastNotifier, Broadcaster, GatewayClient, HostedBroadcaster};
use crate::config::ServerConfig;
use crate::context::{REQUEST_ID_HEADER, require_identity};
use crate::health::{self, HealthResponse};
use crate::routes::{events, items, lists};
use crate::shutdown::ShutdownCoordinator;
use crate::store::ListStore;
use crate::ticket::TicketIssuer;
use crate::topics::TopicHub;
use crate::websocket::subscribe_handler;

/// Which broadcast binding the server runs with.
#[derive(Debug, Clone)]
pub enum Transport {
    /// This process holds subscriber sockets.
    Hosted(Arc<TopicHub>),
    /// An external relay holds them.
    Gateway(Arc<GatewayClient>),
}

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Bearer/identity token verifier.
    pub verifier: IdentityVerifier,
    /// List and item storage.
    pub store: Arc<dyn ListStore>,
    /// Detached broadcast scheduling.
    pub notifier: BroadcastNotifier,
    /// Topic hub (hosted mode only).
    pub hub: Option<Arc<TopicHub>>,
    /// Ticket issuer (gateway mode only).
    pub tickets: Option<Arc<dyn TicketIssuer>>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
}

/// UUID v7 request ids.
#[derive(Clone, Copy, Debug, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::now_v7().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/lists", get(lists::get_lists).post(lists::create_list))
        .route("/lists/{id}", put(lists::update_list).delete(lists::delete_list))
        .route("/lists/{id}/items", get(lists::get_list_items).post(lists::add_item))
        .route("/lists/{id}/items/delete", patch(lists::remove_items))
        .route("/lists/{id}/items/{item_id}/crossed", patch(lists::cross_item))
        .route("/items/{id}", delete(items::delete_item))
        .route("/events/ticket", post(events::issue_ticket))
        .route("/events/sessions", get(events::list_sessions))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_identity))
        // The socket handshake carries its token as a query parameter.
        .route("/events/ws", get(subscribe_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "http",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
}

/// The basket server.
pub struct BasketServer {
    state: AppState,
}

impl BasketServer {
    /// Create a server over `store`, broadcasting through `transport`.
    pub fn new(
        config: ServerConfig,
        verifier: IdentityVerifier,
        store: Arc<dyn ListStore>,
        transport: Transport,
    ) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (broadcaster, hub, tickets) = match transport {
            Transport::Hosted(hub) => {
                let broadcaster: Arc<dyn Broadcaster> = Arc::new(HostedBroadcaster::new(Arc::clone(&hub)));
                (broadcaster, Some(hub), None)
            }
            Transport::Gateway(client) => {
                let broadcaster: Arc<dyn Broadcaster> = client.clone();
                let issuer: Arc<dyn TicketIssuer> = client;
                (broadcaster, None, Some(issuer))
            }
        };
        let notifier = BroadcastNotifier::new(broadcaster, shutdown.tracker());

        Self {
            state: AppState {
                verifier,
                store,
                notifier,
                hub,
                tickets,
                shutdown,
                config: Arc::new(config),
                start_time: Instant::now(),
            },
        }
    }

    /// Build the router for this server.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Bind and start serving. Stops accepting when shutdown begins.
    pub async fn listen(&self) -> std::io::Result<ServerHandle> {
        let listener = tokio::net::TcpListener::bind(self.config().bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.state.shutdown.token();

        info!(%addr, mode = %self.state.notifier.mode(), "basket server listening");
        let server = tokio::spawn(async move {
            let shutdown = async move { token.cancelled().await };
            if let Err(err) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %err, "server exited with error");
            }
        });

        Ok(ServerHandle { addr, server })
    }
}

/// A running server.
#[derive(Debug)]
pub struct ServerHandle {
    /// Bound address.
    pub addr: SocketAddr,
    server: JoinHandle<()>,
}

impl ServerHandle {
    /// The serve task, for [`ShutdownCoordinator::graceful_shutdown`].
    pub fn into_join_handle(self) -> JoinHandle<()> {
        self.server
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.hub.as_ref().map_or(0, |hub| hub.total_connections());
    Json(health::health_check(state.start_time, connections, state.notifier.mode()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryListStore;
    use axum::http::StatusCode;
    use basket_auth::SystemClock;
    use basket_auth::testutil::{mint_valid_token, test_verifier};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn make_server() -> BasketServer {
        BasketServer::new(
            ServerConfig::default(),
            test_verifier(Arc::new(SystemClock)),
            Arc::new(MemoryListStore::new()),
            Transport::Hosted(Arc::new(TopicHub::new())),
        )
    }

    fn token(subject: &str) -> String {
        mint_valid_token(subject, chrono::Utc::now().timestamp())
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn authed(method: &str, uri: &str, subject: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token(subject)));
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn create_list(app: &Router, subject: &str, name: &str) -> String {
        let (status, body) = send(app, authed("POST", "/api/lists", subject, Some(json!({"name": name})))).await;
        assert_eq!(status, StatusCode::OK);
        body["id"].as_str().unwrap().to_string()
    }

    #[test]
    fn server_with_default_config() {
        let server = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
        assert!(!server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = make_server().router();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["mode"], "hosted");
        assert_eq!(body["connections"], 0);
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let app = make_server().router();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let id = resp.headers().get("x-request-id").unwrap().to_str().unwrap();
        assert_eq!(Uuid::parse_str(id).unwrap().get_version_num(), 7);
    }

    #[tokio::test]
    async fn missing_bearer_is_401() {
        let app = make_server().router();
        let req = Request::builder().uri("/api/lists").body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "missing bearer token");
    }

    #[tokio::test]
    async fn invalid_bearer_is_401() {
        let app = make_server().router();
        let req = Request::builder()
            .uri("/api/lists")
            .header("authorization", "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid token");
    }

    #[tokio::test]
    async fn list_crud_flow() {
        let app = make_server().router();
        let list_id = create_list(&app, "alice", "Groceries").await;

        let (status, body) = send(&app, authed("GET", "/api/lists", "alice", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let uri = format!("/api/lists/{list_id}/items");
        let (status, body) = send(&app, authed("POST", &uri, "alice", Some(json!({"itemName": "Milk"})))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["addedItem"]["name"], "Milk");
        let item_id = body["addedItem"]["id"].as_str().unwrap().to_string();

        let (_, body) = send(&app, authed("POST", &uri, "alice", Some(json!({"itemName": "Milk"})))).await;
        assert_eq!(body["listItems"][0]["count"], 2);

        let crossed = format!("/api/lists/{list_id}/items/{item_id}/crossed");
        let (status, _) = send(&app, authed("PATCH", &crossed, "alice", Some(json!({"crossed": true})))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send(&app, authed("GET", &uri, "alice", None)).await;
        assert_eq!(body[0]["crossed"], true);

        let remove = format!("/api/lists/{list_id}/items/delete");
        let (status, _) = send(&app, authed("PATCH", &remove, "alice", Some(json!({"itemIds": [item_id]})))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = send(&app, authed("GET", &uri, "alice", None)).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_and_delete_list() {
        let app = make_server().router();
        let list_id = create_list(&app, "alice", "Groceries").await;
        let uri = format!("/api/lists/{list_id}");

        let (status, body) = send(&app, authed("PUT", &uri, "alice", Some(json!({"name": "Hardware"})))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Hardware");
        assert_eq!(body["id"], list_id.as_str());

        let (status, body) = send(&app, authed("PUT", &uri, "bob", Some(json!({"name": "Mine"})))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "List not found");

        let (status, _) = send(&app, authed("PUT", &uri, "alice", Some(json!({"name": ""})))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, authed("DELETE", &uri, "bob", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, authed("DELETE", &uri, "alice", None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let items = format!("{uri}/items");
        let (status, _) = send(&app, authed("GET", &items, "alice", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, authed("DELETE", &uri, "alice", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_body_uses_error_shape() {
        let app = make_server().router();
        let (status, body) = send(&app, authed("POST", "/api/lists", "alice", Some(json!({"nam": 1})))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("name"));

        let req = Request::builder()
            .method("POST")
            .uri("/api/lists")
            .header("authorization", format!("Bearer {}", token("alice")))
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let req = Request::builder()
            .method("POST")
            .uri("/api/lists")
            .header("authorization", format!("Bearer {}", token("alice")))
            .body(Body::from(r#"{"name":"x"}"#))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn foreign_list_is_404_on_crud() {
        let app = make_server().router();
        let list_id = create_list(&app, "alice", "Mine").await;
        let uri = format!("/api/lists/{list_id}/items");
        let (status, body) = send(&app, authed("GET", &uri, "mallory", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "List not found"}));
    }

    #[tokio::test]
    async fn list_name_is_validated() {
        let app = make_server().router();
        let long = "x".repeat(101);
        let (status, _) = send(&app, authed("POST", "/api/lists", "alice", Some(json!({"name": long})))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, authed("POST", "/api/lists", "alice", Some(json!({"name": ""})))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_item_everywhere() {
        let app = make_server().router();
        let l1 = create_list(&app, "alice", "One").await;
        let l2 = create_list(&app, "alice", "Two").await;
        let (_, body) = send(
            &app,
            authed("POST", &format!("/api/lists/{l1}/items"), "alice", Some(json!({"itemName": "Tea"}))),
        )
        .await;
        let item_id = body["addedItem"]["id"].as_str().unwrap().to_string();
        let _ = send(
            &app,
            authed("POST", &format!("/api/lists/{l2}/items"), "alice", Some(json!({"itemName": "Tea"}))),
        )
        .await;

        let (status, _) = send(&app, authed("DELETE", &format!("/api/items/{item_id}"), "bob", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, authed("DELETE", &format!("/api/items/{item_id}"), "alice", None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        for list in [l1, l2] {
            let (_, body) = send(&app, authed("GET", &format!("/api/lists/{list}/items"), "alice", None)).await;
            assert!(body.as_array().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn ticket_requires_list_id() {
        let app = make_server().router();
        let (status, body) = send(&app, authed("POST", "/api/events/ticket", "alice", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "missing listId"}));
    }

    #[tokio::test]
    async fn ticket_for_foreign_list_is_400() {
        let app = make_server().router();
        let list_id = create_list(&app, "alice", "Mine").await;
        let uri = format!("/api/events/ticket?listId={list_id}");
        let (status, body) = send(&app, authed("POST", &uri, "mallory", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "list not found"}));
    }

    #[tokio::test]
    async fn ticket_in_hosted_mode_is_404() {
        let app = make_server().router();
        let list_id = create_list(&app, "alice", "Mine").await;
        let uri = format!("/api/events/ticket?listId={list_id}");
        let (status, _) = send(&app, authed("POST", &uri, "alice", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sessions_for_idle_list() {
        let app = make_server().router();
        let list_id = create_list(&app, "alice", "Mine").await;
        let uri = format!("/api/events/sessions?listId={list_id}");
        let (status, body) = send(&app, authed("GET", &uri, "alice", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessions"], 0);
        assert_eq!(body["topic"], format!("LIST:{list_id}"));
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = make_server().router();
        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
