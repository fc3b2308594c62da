//! # basket-auth
//!
//! Verification of caller identity tokens issued by a remote secure-token
//! service.
//!
//! - [`IdentityVerifier`]: checks algorithm, key id, signature and every
//!   time/audience/issuer/subject claim, producing a [`CallerIdentity`]
//! - [`KeyCache`]: the issuer's public key set, refreshed when its
//!   advertised expiry passes; concurrent misses share one fetch
//! - [`HttpKeyFetcher`]: the production key source (JSON map of key id to PEM)
//! - [`Clock`]: injected time source, so expiry logic is testable
//!
//! With the `testutil` feature the crate also ships fixed RSA fixtures and
//! helpers that mint signed tokens.
//!
//! [`CallerIdentity`]: basket_core::CallerIdentity

#![deny(unsafe_code)]

pub mod clock;
pub mod errors;
pub mod key_cache;
pub mod keys;
pub mod validation;
pub mod verifier;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{AuthError, TokenRejection};
pub use key_cache::KeyCache;
pub use keys::{HttpKeyFetcher, KeyFetcher, SigningKey, SigningKeySet};
pub use verifier::{IdentityVerifier, VerifierConfig};
