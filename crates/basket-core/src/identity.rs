//! Verified caller identity.

use serde::{Deserialize, Serialize};

/// Claims about the caller extracted from a verified identity token.
///
/// Built fresh for every verified token and never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    /// Stable per-user subject id (the token's `sub` claim).
    pub subject_id: String,
    /// Email address, empty when the token carries none.
    pub email: String,
    /// Whether the issuer has verified the email address.
    pub email_verified: bool,
    /// Issued-at, unix seconds.
    pub issued_at: i64,
    /// Expiry, unix seconds.
    pub expires_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> CallerIdentity {
        CallerIdentity {
            subject_id: "user-1".into(),
            email: "a@example.com".into(),
            email_verified: true,
            issued_at: 1_000,
            expires_at: 4_600,
        }
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(identity()).unwrap();
        assert_eq!(json["subjectId"], "user-1");
        assert_eq!(json["emailVerified"], true);
        assert_eq!(json["expiresAt"], 4_600);
    }
}
