// src/lib.rs

//! ID Token verification for Trimble Identity.
//!
//! Tokens are checked against the provider's published JSON Web Key Set, which
//! is cached in memory and refreshed when it goes stale or when a token names a
//! key the cache has not seen yet.

pub mod config;
pub mod error;
pub mod identity;
pub mod strategy;
pub mod validator;

/// The public prelude for the `trimble-oidc` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::config::{ClientOptions, Config, ConfigBuilder};
    pub use crate::error::TrimbleOidcError;
    pub use crate::identity::{to_identity, IdentityExtra, IdentityInfo, IdentityRecord};
    pub use crate::strategy::{Strategy, TokenResponse};
    pub use crate::validator::claims::VerifiedClaims;
    pub use crate::validator::client::{
        Clock, HttpJwksFetcher, JwksFetcher, KeySetCache, SystemClock, MAX_JWKS_BODY_BYTES,
    };
    pub use crate::validator::model::{JsonWebKey, JsonWebKeySet, KeySet, PublicKey};
    pub use crate::validator::resolver::KeyResolver;
    pub use crate::validator::Validator;
    pub use jsonwebtoken::Algorithm;
}
