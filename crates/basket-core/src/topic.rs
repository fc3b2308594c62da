//! Broadcast topics.
//!
//! A topic is a pure function of a list id: `"LIST:" + list_id`. It is never
//! stored on its own.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::ListId;

/// Prefix shared by every list topic.
pub const LIST_TOPIC_PREFIX: &str = "LIST:";

/// A broadcast channel name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Topic carrying the events of one list.
    #[must_use]
    pub fn for_list(list_id: &ListId) -> Self {
        Self(format!("{LIST_TOPIC_PREFIX}{list_id}"))
    }

    /// Topic name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_for_list() {
        let topic = Topic::for_list(&ListId::from("abc"));
        assert_eq!(topic.as_str(), "LIST:abc");
        assert_eq!(topic.to_string(), "LIST:abc");
    }

    #[test]
    fn topic_is_deterministic() {
        let id = ListId::from("abc");
        assert_eq!(Topic::for_list(&id), Topic::for_list(&id));
    }

    #[test]
    fn topic_serializes_as_string() {
        let topic = Topic::for_list(&ListId::from("abc"));
        assert_eq!(serde_json::to_string(&topic).unwrap(), "\"LIST:abc\"");
    }
}
