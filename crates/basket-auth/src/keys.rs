//! Signing key sets and where they come from.
//!
//! The issuer publishes a JSON object mapping key id to a PEM string (an
//! X.509 certificate or a bare public key). How long the set may be cached is
//! taken from the response headers, never from the body.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use reqwest::header::{CACHE_CONTROL, EXPIRES, HeaderMap};
use tracing::{debug, warn};

use crate::errors::AuthError;

/// One published verification key.
#[derive(Clone)]
pub struct SigningKey {
    decoding: DecodingKey,
}

impl SigningKey {
    /// Parse an RSA verification key from a certificate or public key PEM.
    pub fn from_pem(pem: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let decoding = DecodingKey::from_rsa_pem(pem.as_bytes())?;
        Ok(Self { decoding })
    }

    /// Key ready for signature verification.
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey").finish_non_exhaustive()
    }
}

/// An immutable snapshot of the issuer's keys.
///
/// Replaced wholesale on refresh, never edited in place.
#[derive(Clone, Debug)]
pub struct SigningKeySet {
    keys: HashMap<String, SigningKey>,
    fetched_at: i64,
    expires_at: i64,
}

impl SigningKeySet {
    /// Build a set from `(kid, pem)` pairs.
    ///
    /// Entries whose PEM cannot be parsed are skipped with a warning. A set
    /// with no usable key at all is an error.
    pub fn from_pems<I, K, P>(pems: I, fetched_at: i64, expires_at: i64) -> Result<Self, AuthError>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: AsRef<str>,
    {
        let mut keys = HashMap::new();
        for (kid, pem) in pems {
            let kid = kid.into();
            match SigningKey::from_pem(pem.as_ref()) {
                Ok(key) => {
                    let _ = keys.insert(kid, key);
                }
                Err(error) => warn!(kid = %kid, %error, "skipping unusable signing key"),
            }
        }
        if keys.is_empty() {
            return Err(AuthError::KeyFetch("key set contains no usable keys".into()));
        }
        Ok(Self {
            keys,
            fetched_at,
            expires_at,
        })
    }

    /// Key with the given id.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.get(kid)
    }

    /// Whether a key with this id is present.
    #[must_use]
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    /// Known key ids, sorted.
    #[must_use]
    pub fn key_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false for a constructed set; present for clippy.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// When the set was fetched (unix seconds).
    #[must_use]
    pub fn fetched_at(&self) -> i64 {
        self.fetched_at
    }

    /// When the set stops being usable (unix seconds).
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// True while `now` is strictly before the expiry.
    #[must_use]
    pub fn is_fresh(&self, now: i64) -> bool {
        now < self.expires_at
    }
}

/// Source of signing key sets.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    /// Fetch the current key set. `now` is the fetch time used to turn
    /// relative cache directives into an absolute expiry.
    async fn fetch(&self, now: i64) -> Result<SigningKeySet, AuthError>;
}

/// Fetches keys from the issuer's public metadata endpoint.
#[derive(Clone, Debug)]
pub struct HttpKeyFetcher {
    client: reqwest::Client,
    url: String,
    default_ttl_secs: i64,
}

impl HttpKeyFetcher {
    /// Fetcher with its own HTTP client and request timeout.
    pub fn new(url: impl Into<String>, default_ttl_secs: i64, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url, default_ttl_secs))
    }

    /// Fetcher sharing an existing HTTP client.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>, default_ttl_secs: i64) -> Self {
        Self {
            client,
            url: url.into(),
            default_ttl_secs,
        }
    }
}

#[async_trait]
impl KeyFetcher for HttpKeyFetcher {
    #[tracing::instrument(skip_all, fields(url = %self.url))]
    async fn fetch(&self, now: i64) -> Result<SigningKeySet, AuthError> {
        let resp = self.client.get(&self.url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::KeyFetch(format!(
                "key endpoint returned {}",
                status.as_u16()
            )));
        }

        let expires_at = expiry_from_headers(resp.headers(), now, self.default_ttl_secs);
        let pems: HashMap<String, String> = resp.json().await?;
        let set = SigningKeySet::from_pems(pems, now, expires_at)?;
        debug!(keys = set.len(), ttl = expires_at - now, "fetched signing keys");
        Ok(set)
    }
}

/// Absolute expiry for a response fetched at `now`.
///
/// `Cache-Control` wins over `Expires`; `no-cache`/`no-store` mean "stale
/// immediately". Without a usable directive the default TTL applies.
pub fn expiry_from_headers(headers: &HeaderMap, now: i64, default_ttl_secs: i64) -> i64 {
    if let Some(directive) = headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control)
    {
        return match directive {
            CacheDirective::MaxAge(secs) => now + secs,
            CacheDirective::NoCache => now,
        };
    }

    if let Some(expires) = headers
        .get(EXPIRES)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| chrono::DateTime::parse_from_rfc2822(v.trim()).ok())
    {
        return expires.timestamp();
    }

    now + default_ttl_secs
}

#[derive(Debug, PartialEq, Eq)]
enum CacheDirective {
    MaxAge(i64),
    NoCache,
}

fn parse_cache_control(value: &str) -> Option<CacheDirective> {
    let mut max_age = None;
    for part in value.split(',') {
        let part = part.trim().to_ascii_lowercase();
        if part == "no-cache" || part == "no-store" {
            return Some(CacheDirective::NoCache);
        }
        if let Some(secs) = part.strip_prefix("max-age=") {
            max_age = secs.trim_matches('"').parse::<i64>().ok().map(|s| s.max(0));
        }
    }
    max_age.map(CacheDirective::MaxAge)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
