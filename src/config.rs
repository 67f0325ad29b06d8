// src/config.rs

use crate::error::{Result, TrimbleOidcError};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// The Trimble Identity issuer, used when no other issuer is configured.
pub const DEFAULT_ISSUER: &str = "https://id.trimble.com";

/// Contains the validation settings for an ID Token.
#[derive(Clone, Debug)]
pub struct ValidationDetails {
    /// The single signing algorithm accepted for ID Tokens.
    /// Tokens whose header names any other algorithm are rejected before a key is looked up.
    pub algorithm: Algorithm,
    /// The tolerance for clock skew when validating `exp` and `iat`.
    /// Defaults to 60 seconds.
    pub leeway: Duration,
}

impl Default for ValidationDetails {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::RS256,
            leeway: Duration::from_secs(60),
        }
    }
}

/// OAuth2 endpoints of the identity provider.
///
/// `authorize_url` and `token_url` are resolved against `site`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    pub site: String,
    pub authorize_url: String,
    pub token_url: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            site: DEFAULT_ISSUER.to_string(),
            authorize_url: "/oauth/authorize".to_string(),
            token_url: "/oauth/token".to_string(),
        }
    }
}

/// The main configuration for the `trimble-oidc` validator.
///
/// Construct it with [`ConfigBuilder`].
#[derive(Clone, Debug)]
pub struct Config {
    /// The trusted issuer. Compared byte-for-byte against the `iss` claim,
    /// so it is kept exactly as configured.
    pub issuer: String,
    /// Where the provider publishes its JSON Web Key Set.
    pub jwks_uri: Url,
    /// The specific validation parameters to apply to the token.
    pub validation: ValidationDetails,
    /// How long a fetched key set stays fresh.
    pub cache_ttl: Duration,
    /// Upper bound for a single JWKS request.
    pub fetch_timeout: Duration,
    /// Provider endpoints used by the strategy surface.
    pub client_options: ClientOptions,
    /// Explicit OAuth2 callback URL, if the host does not derive one.
    pub redirect_uri: Option<String>,
}

/// A builder for creating a `Config` instance.
#[derive(Default)]
pub struct ConfigBuilder {
    issuer: Option<String>,
    jwks_uri: Option<Url>,
    cache_ttl: Option<Duration>,
    fetch_timeout: Option<Duration>,
    allow_plain_http: bool,
    client_options: Option<ClientOptions>,
    redirect_uri: Option<String>,
    validation: ValidationDetails,
}

impl ConfigBuilder {
    /// Creates a new `ConfigBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the trusted issuer. Defaults to [`DEFAULT_ISSUER`].
    ///
    /// The value must parse as a URL but is stored untouched.
    pub fn issuer(mut self, issuer: &str) -> Result<Self> {
        Url::parse(issuer).map_err(|e| TrimbleOidcError::InvalidUrl(e.to_string()))?;
        self.issuer = Some(issuer.to_string());
        Ok(self)
    }

    /// Sets the JWKS URI. Defaults to `<issuer>/.well-known/jwks.json`.
    pub fn jwks_uri(mut self, url: &str) -> Result<Self> {
        let parsed_url = Url::parse(url).map_err(|e| TrimbleOidcError::InvalidUrl(e.to_string()))?;
        self.jwks_uri = Some(parsed_url);
        Ok(self)
    }

    /// Sets how long a fetched key set is considered fresh. Defaults to 300 seconds.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Sets the timeout for one JWKS request. Defaults to 10 seconds.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Sets the pinned signing algorithm. Defaults to `RS256`.
    ///
    /// # Errors
    ///
    /// Anything outside the RSA family is refused.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Result<Self> {
        if !is_rsa_family(algorithm) {
            return Err(TrimbleOidcError::InvalidConfiguration(format!(
                "{algorithm:?} is not an RSA signature algorithm"
            )));
        }
        self.validation.algorithm = algorithm;
        Ok(self)
    }

    /// Sets the clock skew tolerance. Defaults to 60 seconds.
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.validation.leeway = leeway;
        self
    }

    /// Permits an `http://` JWKS URI. Only meant for local test servers.
    pub fn allow_plain_http(mut self, allow: bool) -> Self {
        self.allow_plain_http = allow;
        self
    }

    /// Overrides the provider's OAuth2 endpoints.
    pub fn client_options(mut self, options: ClientOptions) -> Self {
        self.client_options = Some(options);
        self
    }

    /// Sets an explicit OAuth2 callback URL.
    pub fn redirect_uri(mut self, uri: &str) -> Self {
        self.redirect_uri = Some(uri.to_string());
        self
    }

    /// Consumes the builder and returns a `Config` object.
    ///
    /// # Errors
    ///
    /// Returns an error if the JWKS URI is not `https` (unless plain HTTP was
    /// explicitly allowed) or if the cache TTL is zero.
    pub fn build(self) -> Result<Config> {
        let issuer = self.issuer.unwrap_or_else(|| DEFAULT_ISSUER.to_string());

        let jwks_uri = match self.jwks_uri {
            Some(uri) => uri,
            None => {
                let derived = format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'));
                Url::parse(&derived).map_err(|e| TrimbleOidcError::InvalidUrl(e.to_string()))?
            }
        };

        match jwks_uri.scheme() {
            "https" => {}
            "http" if self.allow_plain_http => {}
            scheme => {
                return Err(TrimbleOidcError::InvalidConfiguration(format!(
                    "JWKS URI must use https, got '{scheme}'"
                )));
            }
        }

        let cache_ttl = self.cache_ttl.unwrap_or(Duration::from_secs(300));
        if cache_ttl.is_zero() {
            return Err(TrimbleOidcError::InvalidConfiguration(
                "cache_ttl must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            issuer,
            jwks_uri,
            validation: self.validation,
            cache_ttl,
            fetch_timeout: self.fetch_timeout.unwrap_or(Duration::from_secs(10)),
            client_options: self.client_options.unwrap_or_default(),
            redirect_uri: self.redirect_uri,
        })
    }
}

pub(crate) fn is_rsa_family(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}
