//! Hosted subscriber sockets: handshake, authorization and session loop.

pub mod handler;
pub mod session;

pub use handler::{SubscribeQuery, subscribe_handler};
pub use session::{LIST_DELETED_REASON, SessionParams, run_subscriber_session};
