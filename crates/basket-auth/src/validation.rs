//! Token header and claim policy.

use jsonwebtoken::Algorithm;

use crate::errors::TokenRejection;

/// The only algorithm identity tokens may be signed with.
pub const EXPECTED_ALGORITHM: Algorithm = Algorithm::RS256;

/// Unsigned and shared-secret algorithms, refused before any key lookup.
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Accept only [`EXPECTED_ALGORITHM`].
pub fn validate_algorithm(alg: Algorithm) -> Result<(), TokenRejection> {
    if alg == EXPECTED_ALGORITHM {
        Ok(())
    } else {
        Err(TokenRejection::UnsupportedAlgorithm(format!("{alg:?}")))
    }
}

/// Pre-decode check on the raw `alg` header value.
///
/// `none` is not a variant `jsonwebtoken` can represent, so without this a
/// `none` token would surface as a generic parse failure.
pub fn reject_forbidden(raw_alg: &str) -> Result<(), TokenRejection> {
    if FORBIDDEN_ALGORITHMS
        .iter()
        .any(|forbidden| forbidden.eq_ignore_ascii_case(raw_alg))
    {
        return Err(TokenRejection::UnsupportedAlgorithm(raw_alg.to_string()));
    }
    Ok(())
}

/// Time-based claims, in unix seconds.
#[derive(Clone, Copy, Debug)]
pub struct TimeClaims {
    /// `exp`
    pub expires_at: i64,
    /// `iat`
    pub issued_at: i64,
    /// `auth_time`, when present
    pub auth_time: Option<i64>,
}

/// `exp` must be strictly after `now`; `iat` and `auth_time` must not be after it.
pub fn validate_times(claims: TimeClaims, now: i64) -> Result<(), TokenRejection> {
    if claims.expires_at <= now {
        return Err(TokenRejection::Expired);
    }
    if claims.issued_at > now {
        return Err(TokenRejection::IssuedInFuture);
    }
    if claims.auth_time.is_some_and(|t| t > now) {
        return Err(TokenRejection::AuthTimeInFuture);
    }
    Ok(())
}
