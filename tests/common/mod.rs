#![allow(dead_code)]

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{pkcs8::DecodePrivateKey, RsaPrivateKey};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use trimble_oidc::prelude::*;

pub const ISSUER: &str = "https://id.trimble.com";
pub const PROVIDER_KID: &str = "test-key-1";

/// An RSA key pair loaded from a PKCS#8 PEM fixture.
pub struct TestKey {
    pub kid: String,
    encoding_key: EncodingKey,
    n: String,
    e: String,
}

impl TestKey {
    pub fn load(pem: &str, kid: &str) -> Self {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem).unwrap();
        let pkcs1_der = private_key.to_pkcs1_der().unwrap();
        let encoding_key = EncodingKey::from_rsa_der(pkcs1_der.as_bytes());
        let public_key = private_key.to_public_key();
        Self {
            kid: kid.to_string(),
            encoding_key,
            n: base64_url::encode(&public_key.n().to_bytes_be()),
            e: base64_url::encode(&public_key.e().to_bytes_be()),
        }
    }

    /// The key the provider publishes.
    pub fn provider() -> Self {
        Self::load(include_str!("../fixtures/provider_key.pem"), PROVIDER_KID)
    }

    /// A second key pair, never published unless a test does so explicitly.
    pub fn other(kid: &str) -> Self {
        Self::load(include_str!("../fixtures/attacker_key.pem"), kid)
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub fn jwk(&self) -> serde_json::Value {
        serde_json::json!({
            "kty": "RSA",
            "n": self.n,
            "e": self.e,
            "alg": "RS256",
            "use": "sig",
            "kid": self.kid
        })
    }

    pub fn sign(&self, claims: &serde_json::Value) -> String {
        self.sign_with_kid(claims, Some(&self.kid))
    }

    pub fn sign_with_kid(&self, claims: &serde_json::Value, kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        encode(&header, claims, &self.encoding_key).unwrap()
    }
}

pub fn jwks(keys: &[&TestKey]) -> serde_json::Value {
    serde_json::json!({ "keys": keys.iter().map(|k| k.jwk()).collect::<Vec<_>>() })
}

pub fn now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

pub fn valid_claims() -> serde_json::Value {
    let now = now();
    serde_json::json!({
        "sub": "12345",
        "given_name": "John",
        "family_name": "Doe",
        "email": "john.doe@example.com",
        "iss": ISSUER,
        "iat": now,
        "exp": now + 3600
    })
}

/// Replaces one claim (or removes it when `value` is `None`).
pub fn with_claim(mut claims: serde_json::Value, name: &str, value: Option<serde_json::Value>) -> serde_json::Value {
    let map = claims.as_object_mut().unwrap();
    match value {
        Some(value) => map.insert(name.to_string(), value),
        None => map.remove(name),
    };
    claims
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { now: Mutex::new(SystemTime::now()) })
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}

/// In-memory key-set source that counts how often it is asked.
pub struct FakeFetcher {
    jwks: Mutex<JsonWebKeySet>,
    failing: AtomicBool,
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeFetcher {
    pub fn new(keys: &[&TestKey]) -> Arc<Self> {
        Self::with_delay(keys, Duration::ZERO)
    }

    pub fn with_delay(keys: &[&TestKey], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            jwks: Mutex::new(serde_json::from_value(jwks(keys)).unwrap()),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn publish(&self, keys: &[&TestKey]) {
        *self.jwks.lock().unwrap() = serde_json::from_value(jwks(keys)).unwrap();
    }

    pub fn publish_raw(&self, document: serde_json::Value) {
        *self.jwks.lock().unwrap() = serde_json::from_value(document).unwrap();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JwksFetcher for FakeFetcher {
    async fn fetch(&self) -> Result<JsonWebKeySet, TrimbleOidcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TrimbleOidcError::JwksUnavailable { status: 503 });
        }
        Ok(self.jwks.lock().unwrap().clone())
    }

    fn location(&self) -> &str {
        "https://id.trimble.com/.well-known/jwks.json"
    }
}

pub fn test_config() -> Config {
    ConfigBuilder::new().issuer(ISSUER).unwrap().build().unwrap()
}

/// A validator wired to in-memory fakes.
pub fn fake_validator(config: Config, fetcher: &Arc<FakeFetcher>, clock: &Arc<ManualClock>) -> Validator {
    Validator::with_sources(config, fetcher.clone(), clock.clone())
}
