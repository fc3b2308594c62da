//! # basket-server
//!
//! Axum HTTP + `WebSocket` server for shared shopping lists.
//!
//! - List/item CRUD routes behind bearer-token auth; every committed
//!   mutation is broadcast to the list's topic as a detached task
//! - [`topics`]: one in-memory [`TopicRegistry`] per list topic, created on
//!   first subscribe and dropped when its last subscriber leaves
//! - [`broadcast`]: the [`Broadcaster`] contract with two bindings, hosted
//!   sockets ([`HostedBroadcaster`]) or an external relay ([`GatewayClient`])
//! - [`ticket`]: short-lived relay tickets for gateway-mode clients
//! - Graceful shutdown via `CancellationToken`
//!
//! [`TopicRegistry`]: topics::TopicRegistry
//! [`Broadcaster`]: broadcast::Broadcaster
//! [`HostedBroadcaster`]: broadcast::HostedBroadcaster
//! [`GatewayClient`]: broadcast::GatewayClient

#![deny(unsafe_code)]

pub mod broadcast;
pub mod config;
pub mod context;
pub mod errors;
pub mod health;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod store;
pub mod ticket;
pub mod topics;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::{ApiError, BroadcastError, StoreError, UpstreamError};
pub use server::{AppState, BasketServer, ServerHandle, Transport, build_router};
