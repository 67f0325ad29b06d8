// src/validator/model.rs

use crate::error::{Result, TrimbleOidcError};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Represents a single JSON Web Key (JWK) as defined in RFC 7517.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKey {
    pub kid: Option<String>,
    pub kty: String,
    #[serde(rename = "use")]
    pub use_purpose: Option<String>,
    pub alg: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
}

/// Represents a JSON Web Key Set (JWKS), which is a collection of JWKs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

/// An RSA verification key taken from the provider's key set.
#[derive(Clone)]
pub struct PublicKey {
    kid: String,
    algorithm: Option<Algorithm>,
    decoding_key: DecodingKey,
}

impl PublicKey {
    /// Builds a key from a JWK. Fails with [`TrimbleOidcError::InvalidKeyFormat`]
    /// when the entry is unusable for signature verification.
    pub fn from_jwk(jwk: &JsonWebKey) -> Result<Self> {
        let kid = jwk.kid.clone().ok_or_else(|| invalid("key has no 'kid'"))?;
        if jwk.use_purpose.as_deref() == Some("enc") {
            return Err(invalid("encryption key"));
        }
        if jwk.kty != "RSA" {
            return Err(invalid(format!("unsupported key type '{}'", jwk.kty)));
        }
        let algorithm = match jwk.alg.as_deref() {
            Some(alg) => Some(
                Algorithm::from_str(alg).map_err(|_| invalid(format!("unknown algorithm '{alg}'")))?,
            ),
            None => None,
        };
        let n = jwk.n.as_deref().ok_or_else(|| invalid("RSA key missing 'n' component"))?;
        let e = jwk.e.as_deref().ok_or_else(|| invalid("RSA key missing 'e' component"))?;
        let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|err| invalid(err.to_string()))?;

        Ok(Self { kid, algorithm, decoding_key })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The algorithm the provider declared for this key, if any.
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

fn invalid(reason: impl Into<String>) -> TrimbleOidcError {
    TrimbleOidcError::InvalidKeyFormat(reason.into())
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// The provider's trusted verification keys at one point in time.
///
/// Immutable once built: a refresh produces a new `KeySet`.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<PublicKey>,
}

impl KeySet {
    /// Keeps every usable signing key of `jwks` in document order.
    /// Unusable entries are logged and skipped; on a duplicate `kid` the first entry wins.
    pub fn from_jwks(jwks: &JsonWebKeySet) -> Self {
        let mut keys: Vec<PublicKey> = Vec::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            match PublicKey::from_jwk(jwk) {
                Ok(key) if keys.iter().any(|k| k.kid == key.kid) => {
                    warn!(kid = %key.kid, "Duplicate kid in JWKS, keeping the first entry");
                }
                Ok(key) => keys.push(key),
                Err(err) => {
                    warn!(kid = ?jwk.kid, kty = %jwk.kty, error = %err, "Skipping JWK");
                }
            }
        }
        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<&PublicKey> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.kid.as_str())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7517 appendix A.1 example modulus.
    const N: &str = "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw";

    fn rsa_jwk(kid: &str) -> serde_json::Value {
        serde_json::json!({ "kty": "RSA", "kid": kid, "alg": "RS256", "use": "sig", "n": N, "e": "AQAB" })
    }

    #[test]
    fn keeps_usable_keys_in_document_order() {
        let jwks: JsonWebKeySet = serde_json::from_value(serde_json::json!({
            "keys": [
                rsa_jwk("second"),
                { "kty": "EC", "kid": "ec-key", "crv": "P-256", "x": "AA", "y": "AA" },
                { "kty": "RSA", "kid": "enc-key", "use": "enc", "n": N, "e": "AQAB" },
                { "kty": "RSA", "kid": "broken" },
                rsa_jwk("first"),
                rsa_jwk("second"),
            ]
        }))
        .unwrap();

        let key_set = KeySet::from_jwks(&jwks);
        assert_eq!(key_set.kids().collect::<Vec<_>>(), vec!["second", "first"]);
        assert_eq!(key_set.get("first").unwrap().algorithm(), Some(Algorithm::RS256));
        assert!(key_set.get("ec-key").is_none());
    }

    #[test]
    fn key_without_kid_is_unusable() {
        let jwk = JsonWebKey {
            kid: None,
            kty: "RSA".to_string(),
            use_purpose: None,
            alg: None,
            n: Some(N.to_string()),
            e: Some("AQAB".to_string()),
        };
        let result = PublicKey::from_jwk(&jwk);
        assert!(matches!(result, Err(TrimbleOidcError::InvalidKeyFormat(_))), "got {result:?}");
    }

    #[test]
    fn encryption_and_incomplete_keys_report_invalid_key_format() {
        let enc: JsonWebKey = serde_json::from_value(
            serde_json::json!({ "kty": "RSA", "kid": "enc-key", "use": "enc", "n": N, "e": "AQAB" }),
        )
        .unwrap();
        let err = PublicKey::from_jwk(&enc).unwrap_err();
        assert!(matches!(&err, TrimbleOidcError::InvalidKeyFormat(reason) if reason == "encryption key"));

        let no_modulus: JsonWebKey =
            serde_json::from_value(serde_json::json!({ "kty": "RSA", "kid": "broken", "e": "AQAB" })).unwrap();
        let err = PublicKey::from_jwk(&no_modulus).unwrap_err();
        assert!(matches!(&err, TrimbleOidcError::InvalidKeyFormat(reason) if reason.contains("'n'")));

        let unknown_alg: JsonWebKey = serde_json::from_value(
            serde_json::json!({ "kty": "RSA", "kid": "odd", "alg": "XS999", "n": N, "e": "AQAB" }),
        )
        .unwrap();
        assert!(matches!(PublicKey::from_jwk(&unknown_alg), Err(TrimbleOidcError::InvalidKeyFormat(_))));
    }
}
