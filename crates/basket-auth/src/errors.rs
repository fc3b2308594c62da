//! Auth error types.

/// Why a token was refused.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    /// Not a structurally valid signed token.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Header algorithm is not the expected asymmetric one.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Header carries no key id.
    #[error("token header has no key id")]
    MissingKeyId,

    /// No known signing key has the header's key id.
    #[error("no signing key for key id: {0}")]
    UnknownKeyId(String),

    /// Signature does not verify against the matched key.
    #[error("signature verification failed")]
    BadSignature,

    /// `exp` is not strictly in the future.
    #[error("token expired")]
    Expired,

    /// `iat` is in the future.
    #[error("token issued in the future")]
    IssuedInFuture,

    /// `auth_time` is in the future.
    #[error("auth time is in the future")]
    AuthTimeInFuture,

    /// `aud` does not name the configured project.
    #[error("unexpected audience: {0}")]
    WrongAudience(String),

    /// `iss` is not the expected issuer URL.
    #[error("unexpected issuer: {0}")]
    WrongIssuer(String),

    /// `sub` is empty.
    #[error("token subject is empty")]
    EmptySubject,
}

/// Errors from token verification and key retrieval.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token was refused. Never retried.
    #[error("invalid token: {0}")]
    TokenInvalid(#[from] TokenRejection),

    /// The signing keys could not be obtained. Safe to retry on a later request.
    #[error("failed to fetch signing keys: {0}")]
    KeyFetch(String),
}

impl AuthError {
    /// Whether this is a token rejection (as opposed to an infrastructure failure).
    #[must_use]
    pub fn is_token_invalid(&self) -> bool {
        matches!(self, Self::TokenInvalid(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::KeyFetch(err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
