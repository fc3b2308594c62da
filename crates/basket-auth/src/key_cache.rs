//! Process-wide cache of the issuer's signing keys.
//!
//! Readers take a cheap snapshot (`Arc<SigningKeySet>`) under a read lock;
//! refreshes swap the whole `Arc` under a write lock, so no reader ever sees
//! a half-replaced set. Misses serialise on an async refresh lock. A caller
//! that waited on that lock while another caller's fetch completed takes
//! that fetch's outcome, success or failure, instead of fetching again, so a
//! burst of concurrent misses costs one network fetch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::errors::AuthError;
use crate::keys::{KeyFetcher, SigningKeySet};

/// Outcome of the most recent fetch, kept under the refresh lock.
type FetchOutcome = Result<Arc<SigningKeySet>, String>;

/// Shared signing key cache. Construct once, share by `Arc`.
pub struct KeyCache {
    fetcher: Arc<dyn KeyFetcher>,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<Arc<SigningKeySet>>>,
    refresh_lock: tokio::sync::Mutex<Option<FetchOutcome>>,
    min_refresh_secs: i64,
    /// Completed fetch attempts. Bumped under `refresh_lock`.
    fetches: AtomicU64,
}

impl KeyCache {
    /// Create an empty cache. The first lookup fetches.
    ///
    /// `min_refresh_secs` is the minimum age of the current set before an
    /// unknown key id may force an early refresh.
    pub fn new(fetcher: Arc<dyn KeyFetcher>, clock: Arc<dyn Clock>, min_refresh_secs: i64) -> Self {
        Self {
            fetcher,
            clock,
            current: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(None),
            min_refresh_secs,
            fetches: AtomicU64::new(0),
        }
    }

    /// The current key set, fetching if the cache is empty or expired.
    ///
    /// Fails only when no fresh set is cached and the fetch fails.
    pub async fn get_keys(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        let seen = self.fetch_count();
        if let Some(set) = self.fresh_snapshot(self.clock.now()) {
            return Ok(set);
        }
        self.refresh_unless(seen, |set, now| set.is_fresh(now)).await
    }

    /// A key set that should contain `kid`.
    ///
    /// If the fresh set lacks `kid` and is older than the refresh floor, one
    /// early refresh is attempted (the issuer may have rotated keys). The
    /// returned set may still lack `kid`; the caller decides what that means.
    pub async fn get_keys_for(&self, kid: &str) -> Result<Arc<SigningKeySet>, AuthError> {
        let set = self.get_keys().await?;
        let seen = self.fetch_count();
        if set.contains(kid) || !self.may_force_refresh(&set, self.clock.now()) {
            return Ok(set);
        }

        debug!(kid, "unknown key id, forcing key refresh");
        let result = self
            .refresh_unless(seen, |set, now| {
                set.is_fresh(now) && (set.contains(kid) || !self.may_force_refresh(set, now))
            })
            .await;
        match result {
            Ok(refreshed) => Ok(refreshed),
            Err(error) => {
                // Still fresh, so keep serving it.
                warn!(%error, "forced key refresh failed");
                Ok(set)
            }
        }
    }

    /// Snapshot of the cached set without fetching, fresh or not.
    #[must_use]
    pub fn cached(&self) -> Option<Arc<SigningKeySet>> {
        self.current.read().clone()
    }

    /// Number of fetches completed so far, failed ones included.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Acquire)
    }

    fn fresh_snapshot(&self, now: i64) -> Option<Arc<SigningKeySet>> {
        self.current
            .read()
            .as_ref()
            .filter(|set| set.is_fresh(now))
            .cloned()
    }

    fn may_force_refresh(&self, set: &SigningKeySet, now: i64) -> bool {
        now - set.fetched_at() >= self.min_refresh_secs
    }

    /// Fetch a new set unless, once the refresh lock is held, the current
    /// set satisfies `good_enough` or a fetch completed after `seen`.
    async fn refresh_unless<F>(&self, seen: u64, good_enough: F) -> Result<Arc<SigningKeySet>, AuthError>
    where
        F: Fn(&SigningKeySet, i64) -> bool,
    {
        let mut last = self.refresh_lock.lock().await;

        let now = self.clock.now();
        if let Some(set) = self.cached() {
            if good_enough(&set, now) {
                return Ok(set);
            }
        }
        if self.fetch_count() != seen {
            if let Some(outcome) = last.as_ref() {
                debug!("sharing key fetch that completed while waiting");
                return outcome.clone().map_err(AuthError::KeyFetch);
            }
        }

        let outcome = match self.fetcher.fetch(now).await {
            Ok(set) => {
                let set = Arc::new(set);
                debug!(kids = ?set.key_ids(), expires_at = set.expires_at(), "signing keys refreshed");
                *self.current.write() = Some(Arc::clone(&set));
                Ok(set)
            }
            Err(AuthError::KeyFetch(message)) => Err(message),
            Err(other) => Err(other.to_string()),
        };
        *last = Some(outcome.clone());
        let _ = self.fetches.fetch_add(1, Ordering::AcqRel);
        outcome.map_err(AuthError::KeyFetch)
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("cached", &self.cached().map(|s| s.len()))
            .field("fetches", &self.fetch_count())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
