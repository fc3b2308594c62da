//! Test fixtures: fixed RSA keys and token minting.
//!
//! Available to this crate's tests and, through the `testutil` feature, to
//! dependent crates.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::clock::Clock;
use crate::errors::AuthError;
use crate::key_cache::KeyCache;
use crate::keys::{KeyFetcher, SigningKeySet};
use crate::verifier::{IdentityVerifier, VerifierConfig};

/// Key id under which the primary key is published.
pub const PRIMARY_KID: &str = "primary-kid";
/// Key id of a second key, unknown to the issuer unless published explicitly.
pub const ROGUE_KID: &str = "rogue-kid";

/// PKCS#8 private key matching [`PRIMARY_CERT_PEM`].
pub const PRIMARY_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/primary_key.pem");
/// Self-signed X.509 certificate for the primary key.
pub const PRIMARY_CERT_PEM: &str = include_str!("../fixtures/primary_cert.pem");
/// Bare public key of the primary key.
pub const PRIMARY_PUBLIC_KEY_PEM: &str = include_str!("../fixtures/primary_public.pem");
/// PKCS#8 private key of the second key pair.
pub const ROGUE_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/rogue_key.pem");
/// Certificate of the second key pair.
pub const ROGUE_CERT_PEM: &str = include_str!("../fixtures/rogue_cert.pem");

/// Project id (audience) the fixtures are issued for.
pub const TEST_PROJECT_ID: &str = "basket-test";

/// Issuer URL matching [`TEST_PROJECT_ID`].
#[must_use]
pub fn test_issuer() -> String {
    format!("https://securetoken.google.com/{TEST_PROJECT_ID}")
}

/// A complete, valid claim set for `subject`, issued one minute before `now`
/// and expiring an hour after.
#[must_use]
pub fn claims_for(subject: &str, now: i64) -> Value {
    json!({
        "iss": test_issuer(),
        "aud": TEST_PROJECT_ID,
        "auth_time": now - 60,
        "user_id": subject,
        "sub": subject,
        "iat": now - 60,
        "exp": now + 3_600,
        "email": format!("{subject}@example.com"),
        "email_verified": true,
    })
}

/// Sign `claims` with RS256 under `kid`.
///
/// # Panics
///
/// Panics if the private key does not parse or signing fails.
#[must_use]
pub fn mint_token(kid: &str, private_key_pem: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).expect("fixture key parses");
    jsonwebtoken::encode(&header, claims, &key).expect("token signs")
}

/// A valid token for `subject` signed by the primary key.
#[must_use]
pub fn mint_valid_token(subject: &str, now: i64) -> String {
    mint_token(PRIMARY_KID, PRIMARY_PRIVATE_KEY_PEM, &claims_for(subject, now))
}

/// Key fetcher serving a fixed, swappable PEM map and counting calls.
pub struct StaticKeyFetcher {
    pems: Mutex<Vec<(String, String)>>,
    ttl_secs: i64,
    delay: Option<Duration>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StaticKeyFetcher {
    /// Serve `pems`, each set valid for `ttl_secs`.
    #[must_use]
    pub fn new(pems: Vec<(String, String)>, ttl_secs: i64) -> Self {
        Self {
            pems: Mutex::new(pems),
            ttl_secs,
            delay: None,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Serve only the primary certificate.
    #[must_use]
    pub fn primary(ttl_secs: i64) -> Self {
        Self::new(vec![(PRIMARY_KID.to_string(), PRIMARY_CERT_PEM.to_string())], ttl_secs)
    }

    /// A fetcher whose every call fails.
    #[must_use]
    pub fn failing() -> Self {
        let fetcher = Self::new(Vec::new(), 0);
        fetcher.set_failing(true);
        fetcher
    }

    /// Sleep this long inside every fetch.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the served keys.
    pub fn set_pems(&self, pems: Vec<(String, String)>) {
        *self.pems.lock() = pems;
    }

    /// Toggle failure.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fetches performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyFetcher for StaticKeyFetcher {
    async fn fetch(&self, now: i64) -> Result<SigningKeySet, AuthError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::KeyFetch("key endpoint unreachable".into()));
        }
        let pems: HashMap<String, String> = self.pems.lock().iter().cloned().collect();
        SigningKeySet::from_pems(pems, now, now + self.ttl_secs)
    }
}

/// A verifier for [`TEST_PROJECT_ID`] whose keys come from the primary
/// fixture and whose time comes from `clock`.
#[must_use]
pub fn test_verifier(clock: Arc<dyn Clock>) -> IdentityVerifier {
    let keys = Arc::new(KeyCache::new(
        Arc::new(StaticKeyFetcher::primary(3_600)),
        Arc::clone(&clock),
        60,
    ));
    IdentityVerifier::new(VerifierConfig::new(TEST_PROJECT_ID, test_issuer()), keys, clock)
}
