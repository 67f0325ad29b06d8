// src/validator/resolver.rs

use super::client::KeySetCache;
use super::model::PublicKey;
use crate::error::{Result, TrimbleOidcError};
use tracing::{debug, instrument};

/// Selects the verification key a token names in its `kid` header.
#[derive(Clone)]
pub struct KeyResolver {
    cache: KeySetCache,
}

impl KeyResolver {
    /// Creates a resolver that looks keys up in `cache`.
    pub fn new(cache: KeySetCache) -> Self {
        Self { cache }
    }

    /// The key set cache backing this resolver.
    pub fn cache(&self) -> &KeySetCache {
        &self.cache
    }

    /// Looks `kid` up in the cached key set. On a miss the key set is refreshed
    /// once, which picks up keys the provider rotated in since the last fill.
    ///
    /// A token without a `kid` is never matched against "any" key.
    #[instrument(skip(self), err)]
    pub async fn resolve(&self, kid: Option<&str>) -> Result<PublicKey> {
        let kid = kid.ok_or(TrimbleOidcError::MissingKeyId)?;

        let key_set = self.cache.get_keys(false).await?;
        if let Some(key) = key_set.get(kid) {
            return Ok(key.clone());
        }

        debug!(kid, "Key not in cached JWKS, forcing a refresh");
        let key_set = self.cache.get_keys(true).await?;
        key_set
            .get(kid)
            .cloned()
            .ok_or_else(|| TrimbleOidcError::KeyNotFound(kid.to_string()))
    }
}
