// src/validator/client.rs

use super::model::{JsonWebKeySet, KeySet};
use crate::error::{Result, TrimbleOidcError};
use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use moka::Entry;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, instrument};
use url::Url;

/// Largest JWKS document the HTTP fetcher will read, in bytes.
pub const MAX_JWKS_BODY_BYTES: usize = 512 * 1024;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// [`Clock`] backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Retrieves the provider's published key-set document.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    /// Performs exactly one retrieval of the key-set document.
    async fn fetch(&self) -> Result<JsonWebKeySet>;

    /// Identifies the document, used as the cache key.
    fn location(&self) -> &str;
}

/// Fetches the JWKS over HTTPS with `reqwest`.
///
/// Certificates are verified against the system trust roots; there is no way
/// to turn that off.
#[derive(Clone)]
pub struct HttpJwksFetcher {
    http_client: reqwest::Client,
    jwks_uri: Url,
}

impl HttpJwksFetcher {
    /// Creates a fetcher whose requests give up after `timeout`.
    pub fn new(jwks_uri: Url, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http_client, jwks_uri })
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    #[instrument(skip(self), fields(jwks_uri = %self.jwks_uri), err)]
    async fn fetch(&self) -> Result<JsonWebKeySet> {
        debug!("Fetching JWKS");
        let mut response = self
            .http_client
            .get(self.jwks_uri.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrimbleOidcError::JwksUnavailable { status: status.as_u16() });
        }

        if response.content_length().is_some_and(|len| len > MAX_JWKS_BODY_BYTES as u64) {
            return Err(body_too_large());
        }
        // Content-Length may be absent or wrong, so the cap is enforced while reading too.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > MAX_JWKS_BODY_BYTES {
                return Err(body_too_large());
            }
            body.extend_from_slice(&chunk);
        }
        serde_json::from_slice(&body).map_err(|e| TrimbleOidcError::InvalidJwks(e.to_string()))
    }

    fn location(&self) -> &str {
        self.jwks_uri.as_str()
    }
}

fn body_too_large() -> TrimbleOidcError {
    TrimbleOidcError::InvalidJwks(format!("document exceeds {MAX_JWKS_BODY_BYTES} bytes"))
}

/// A fetched key set together with the time it was fetched.
#[derive(Debug)]
pub struct CacheEntry {
    key_set: Arc<KeySet>,
    fetched_at: SystemTime,
}

impl CacheEntry {
    pub fn key_set(&self) -> &Arc<KeySet> {
        &self.key_set
    }

    pub fn fetched_at(&self) -> SystemTime {
        self.fetched_at
    }
}

/// Caches the provider's key set and refreshes it when it goes stale.
///
/// Cheap to clone; clones share the same entry. Concurrent refreshes are collapsed
/// into a single fetch, and a failed refresh never serves the stale entry.
#[derive(Clone)]
pub struct KeySetCache {
    inner: Arc<Inner>,
}

struct Inner {
    fetcher: Arc<dyn JwksFetcher>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cache_key: String,
    // Holds at most one entry, keyed by the document location.
    entries: Cache<String, Arc<CacheEntry>>,
}

impl KeySetCache {
    /// Creates an empty cache; the first `get_keys` call fills it from `fetcher`.
    pub fn new(fetcher: Arc<dyn JwksFetcher>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        let cache_key = fetcher.location().to_string();
        Self {
            inner: Arc::new(Inner {
                fetcher,
                clock,
                ttl,
                cache_key,
                entries: Cache::builder().initial_capacity(1).build(),
            }),
        }
    }

    /// Returns the current key set, fetching a new one when there is none, when
    /// it is older than the TTL, or when `force_refresh` is set.
    #[instrument(skip(self), fields(jwks_uri = %self.inner.cache_key), err)]
    pub async fn get_keys(&self, force_refresh: bool) -> Result<Arc<KeySet>> {
        let observed = self.inner.entries.get(&self.inner.cache_key).await;
        if let Some(entry) = &observed {
            if !force_refresh && self.is_fresh(entry) {
                debug!("JWKS cache hit");
                return Ok(entry.key_set.clone());
            }
        }

        debug!(cached = observed.is_some(), "JWKS cache refresh required");
        let entry = self.refresh(observed).await?;
        Ok(entry.key_set.clone())
    }

    /// The entry currently held, fresh or not.
    pub async fn current(&self) -> Option<Arc<CacheEntry>> {
        self.inner.entries.get(&self.inner.cache_key).await
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        // A clock that moved backwards counts as zero age.
        let age = self
            .inner
            .clock
            .now()
            .duration_since(entry.fetched_at)
            .unwrap_or_default();
        age < self.inner.ttl
    }

    async fn refresh(&self, observed: Option<Arc<CacheEntry>>) -> Result<Arc<CacheEntry>> {
        let result = self
            .inner
            .entries
            .entry(self.inner.cache_key.clone())
            .and_try_compute_with(|current| self.compute(current, observed))
            .await?;

        match result {
            CompResult::Inserted(entry)
            | CompResult::ReplacedWith(entry)
            | CompResult::Unchanged(entry) => Ok(entry.into_value()),
            _ => Err(TrimbleOidcError::InvalidJwks(
                "no key set available after refresh".to_string(),
            )),
        }
    }

    // Runs under moka's per-key lock, so only one caller fetches at a time.
    async fn compute(
        &self,
        current: Option<Entry<String, Arc<CacheEntry>>>,
        observed: Option<Arc<CacheEntry>>,
    ) -> Result<Op<Arc<CacheEntry>>> {
        if let Some(current) = current {
            let current = current.into_value();
            let replaced = observed
                .as_ref()
                .map_or(true, |seen| !Arc::ptr_eq(seen, &current));
            if replaced && self.is_fresh(&current) {
                debug!("JWKS refreshed by a concurrent caller");
                return Ok(Op::Nop);
            }
        }

        let jwks = self.inner.fetcher.fetch().await?;
        let key_set = KeySet::from_jwks(&jwks);
        info!(
            jwks_uri = %self.inner.cache_key,
            key_count = key_set.len(),
            "JWKS cache refreshed"
        );

        Ok(Op::Put(Arc::new(CacheEntry {
            key_set: Arc::new(key_set),
            fetched_at: self.inner.clock.now(),
        })))
    }
}
