//! Relay connection tickets.
//!
//! A ticket lets a client authenticate to the external relay without handing
//! it the bearer token. Whether a ticket is single-use is up to the relay;
//! the expiry recorded here is the assumed lifetime and is not enforced.

use async_trait::async_trait;
use basket_core::{CallerIdentity, Topic};

use crate::errors::UpstreamError;

/// A short-lived credential bound to one subject and one topic.
#[derive(Clone, PartialEq, Eq)]
pub struct Ticket {
    /// Opaque bearer string the relay accepts on connect.
    pub token: String,
    /// Topic the ticket is valid for.
    pub bound_topic: Topic,
    /// Subject the ticket was issued to.
    pub bound_subject: String,
    /// Assumed expiry, unix seconds.
    pub expires_at: i64,
}

impl std::fmt::Debug for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket")
            .field("token", &"[redacted]")
            .field("bound_topic", &self.bound_topic)
            .field("bound_subject", &self.bound_subject)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Issues relay tickets.
///
/// Callers must have checked list ownership already; the issuer trusts them.
#[async_trait]
pub trait TicketIssuer: Send + Sync {
    /// Ask the relay for a ticket binding `identity` to `topic`.
    async fn issue_ticket(&self, identity: &CallerIdentity, topic: &Topic) -> Result<Ticket, UpstreamError>;

    /// Relay URL a client connects to for `topic`. No network access.
    fn connection_url(&self, topic: &Topic) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_core::ListId;

    fn ticket() -> Ticket {
        Ticket {
            token: "super-secret".into(),
            bound_topic: Topic::for_list(&ListId::from("l1")),
            bound_subject: "user-1".into(),
            expires_at: 1_060,
        }
    }

    #[test]
    fn debug_redacts_token() {
        let rendered = format!("{:?}", ticket());
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("LIST:l1"));
    }
}
