// src/validator/mod.rs

pub mod claims;
pub mod client;
pub mod model;
pub mod resolver;

use crate::config::Config;
use crate::error::{Result, TrimbleOidcError};
use base64::engine::{general_purpose::URL_SAFE_NO_PAD, Engine};
use claims::VerifiedClaims;
use client::{Clock, HttpJwksFetcher, JwksFetcher, KeySetCache, SystemClock};
use jsonwebtoken::Algorithm;
use resolver::KeyResolver;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, instrument};

/// The ID Token verifier.
///
/// Create it once and share it between requests: it owns the key set cache, and
/// clones share that cache.
#[derive(Clone)]
pub struct Validator {
    config: Config,
    resolver: KeyResolver,
}

/// The JOSE header fields the verifier looks at.
#[derive(Debug, Deserialize)]
struct JoseHeader {
    alg: String,
    kid: Option<String>,
}

impl Validator {
    /// Creates a `Validator` that fetches keys from `config.jwks_uri` over HTTPS.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = HttpJwksFetcher::new(config.jwks_uri.clone(), config.fetch_timeout)?;
        Ok(Self::with_sources(config, Arc::new(fetcher), Arc::new(SystemClock)))
    }

    /// Creates a `Validator` with an explicit key-set source and clock.
    pub fn with_sources(config: Config, fetcher: Arc<dyn JwksFetcher>, clock: Arc<dyn Clock>) -> Self {
        let cache = KeySetCache::new(fetcher, clock, config.cache_ttl);
        Self {
            config,
            resolver: KeyResolver::new(cache),
        }
    }

    /// The configuration this validator was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The key resolver, and through it the key set cache.
    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }

    /// Verifies an ID Token and returns its claims.
    ///
    /// The checks run in a fixed order and stop at the first failure:
    /// 1. token structure (three base64url segments),
    /// 2. header algorithm against the pinned algorithm,
    /// 3. key lookup by `kid`,
    /// 4. signature,
    /// 5. presence of `exp`, `iss` and `sub`,
    /// 6. issuer,
    /// 7. expiry, then issued-at, both with the configured leeway.
    ///
    /// An absent or empty token is not an error: it yields [`VerifiedClaims::empty`].
    #[instrument(skip(self, token), err)]
    pub async fn verify(&self, token: Option<&str>) -> Result<VerifiedClaims> {
        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => {
                debug!("No ID token presented");
                return Ok(VerifiedClaims::empty());
            }
        };

        let segments: Vec<&str> = token.split('.').collect();
        let (header_segment, payload_segment, signature_segment) = match segments.as_slice() {
            [header, payload, signature] => (*header, *payload, *signature),
            _ => {
                return Err(TrimbleOidcError::Decode(format!(
                    "expected 3 segments, found {}",
                    segments.len()
                )));
            }
        };

        let header: JoseHeader = decode_segment(header_segment, "header")?;
        let algorithm = self.config.validation.algorithm;
        match Algorithm::from_str(&header.alg) {
            Ok(alg) if alg == algorithm => {}
            _ => return Err(TrimbleOidcError::UnsupportedAlgorithm(header.alg)),
        }

        let key = self.resolver.resolve(header.kid.as_deref()).await?;
        if let Some(key_alg) = key.algorithm() {
            if key_alg != algorithm {
                return Err(TrimbleOidcError::UnsupportedAlgorithm(format!("{key_alg:?}")));
            }
        }

        let signing_input = &token[..header_segment.len() + 1 + payload_segment.len()];
        let signature_ok = jsonwebtoken::crypto::verify(
            signature_segment,
            signing_input.as_bytes(),
            key.decoding_key(),
            algorithm,
        )
        .map_err(|e| TrimbleOidcError::Decode(format!("signature: {e}")))?;
        if !signature_ok {
            return Err(TrimbleOidcError::InvalidSignature);
        }
        debug!(kid = key.kid(), "Signature verified");

        let payload: Map<String, Value> = decode_segment(payload_segment, "payload")?;
        let claims = VerifiedClaims::from_payload(payload)?;

        if claims.iss != self.config.issuer {
            return Err(TrimbleOidcError::InvalidIssuer {
                expected: self.config.issuer.clone(),
                actual: claims.iss,
            });
        }

        let now = self.now_secs();
        let leeway = i64::try_from(self.config.validation.leeway.as_secs()).unwrap_or(i64::MAX);
        if claims.exp < now.saturating_sub(leeway) {
            return Err(TrimbleOidcError::ExpiredSignature);
        }
        if let Some(iat) = claims.iat {
            if iat > now.saturating_add(leeway) {
                return Err(TrimbleOidcError::IssuedInFuture);
            }
        }

        debug!(sub = %claims.sub, "ID token verified");
        Ok(claims)
    }

    fn now_secs(&self) -> i64 {
        self.resolver
            .cache()
            .clock()
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str, part: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TrimbleOidcError::Decode(format!("{part}: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| TrimbleOidcError::Decode(format!("{part}: {e}")))
}
