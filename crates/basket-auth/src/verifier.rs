//! Identity token verification.
//!
//! A token is accepted only if every check passes: allowed algorithm, known
//! key id, valid signature, unexpired, not issued in the future, audience and
//! issuer matching the configured project, non-empty subject, and an
//! `auth_time` (when present) not in the future. The verifier holds no
//! mutable state of its own; key caching lives in [`KeyCache`].

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use basket_core::CallerIdentity;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Validation, decode, decode_header};
use serde::Deserialize;
use tracing::debug;

use crate::clock::Clock;
use crate::errors::{AuthError, TokenRejection};
use crate::key_cache::KeyCache;
use crate::keys::SigningKey;
use crate::validation::{EXPECTED_ALGORITHM, TimeClaims, reject_forbidden, validate_algorithm, validate_times};

/// Expected audience and issuer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Required `aud` (the project id).
    pub audience: String,
    /// Required `iss`.
    pub issuer: String,
}

impl VerifierConfig {
    /// Require `aud == audience` and `iss == issuer`.
    #[must_use]
    pub fn new(audience: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            issuer: issuer.into(),
        }
    }
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    iss: String,
    aud: String,
    sub: String,
    iat: i64,
    exp: i64,
    #[serde(default)]
    auth_time: Option<i64>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

/// Verifies bearer identity tokens. Cheap to clone; safe to share.
#[derive(Clone)]
pub struct IdentityVerifier {
    config: VerifierConfig,
    keys: Arc<KeyCache>,
    clock: Arc<dyn Clock>,
}

impl IdentityVerifier {
    /// Create a verifier reading keys from `keys`.
    pub fn new(config: VerifierConfig, keys: Arc<KeyCache>, clock: Arc<dyn Clock>) -> Self {
        Self { config, keys, clock }
    }

    /// Expected audience and issuer.
    #[must_use]
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// The key cache backing this verifier.
    #[must_use]
    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.keys
    }

    /// Verify `token` and return the caller it identifies.
    #[tracing::instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        let kid = inspect_header(token)?;
        let keys = self.keys.get_keys_for(&kid).await?;
        let key = keys
            .get(&kid)
            .ok_or_else(|| TokenRejection::UnknownKeyId(kid.clone()))?;
        let claims = decode_claims(token, key)?;
        let identity = self.check_claims(claims, self.clock.now())?;
        debug!(subject = %identity.subject_id, "token verified");
        Ok(identity)
    }

    fn check_claims(&self, claims: IdTokenClaims, now: i64) -> Result<CallerIdentity, TokenRejection> {
        validate_times(
            TimeClaims {
                expires_at: claims.exp,
                issued_at: claims.iat,
                auth_time: claims.auth_time,
            },
            now,
        )?;
        if claims.aud != self.config.audience {
            return Err(TokenRejection::WrongAudience(claims.aud));
        }
        if claims.iss != self.config.issuer {
            return Err(TokenRejection::WrongIssuer(claims.iss));
        }
        if claims.sub.is_empty() {
            return Err(TokenRejection::EmptySubject);
        }
        Ok(CallerIdentity {
            subject_id: claims.sub,
            email: claims.email.unwrap_or_default(),
            email_verified: claims.email_verified,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}

impl std::fmt::Debug for IdentityVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityVerifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Check the header and return its key id.
fn inspect_header(token: &str) -> Result<String, TokenRejection> {
    let segment = token.split('.').next().unwrap_or_default();
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenRejection::Malformed(format!("header encoding: {e}")))?;
    let raw: RawHeader = serde_json::from_slice(&bytes)
        .map_err(|e| TokenRejection::Malformed(format!("header json: {e}")))?;
    reject_forbidden(&raw.alg)?;

    let header = decode_header(token).map_err(rejection_from)?;
    validate_algorithm(header.alg)?;
    header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or(TokenRejection::MissingKeyId)
}

/// Verify the signature and deserialize the claims. Claim values are checked
/// afterwards against the injected clock, so the library's own checks are off.
fn decode_claims(token: &str, key: &SigningKey) -> Result<IdTokenClaims, TokenRejection> {
    let mut validation = Validation::new(EXPECTED_ALGORITHM);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "iat", "aud", "iss", "sub"]);

    decode::<IdTokenClaims>(token, key.decoding_key(), &validation)
        .map(|data| data.claims)
        .map_err(rejection_from)
}

fn rejection_from(err: jsonwebtoken::errors::Error) -> TokenRejection {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenRejection::BadSignature,
        ErrorKind::InvalidAlgorithm => TokenRejection::UnsupportedAlgorithm(err.to_string()),
        _ => TokenRejection::Malformed(err.to_string()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
