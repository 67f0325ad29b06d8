// src/strategy.rs

use crate::config::Config;
use crate::error::{Result, TrimbleOidcError};
use crate::identity::{to_identity, IdentityRecord};
use crate::validator::Validator;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};
use url::Url;

/// Name under which hosts register this provider.
pub const STRATEGY_NAME: &str = "trimble_oauth2";

/// Request parameters forwarded to the authorize endpoint when present.
pub const AUTHORIZE_OPTIONS: [&str; 3] = ["state", "redirect_uri", "scope"];

/// OAuth2 response type requested from the authorize endpoint.
pub const RESPONSE_TYPE: &str = "code";

/// The token bundle returned by the provider's token endpoint.
///
/// Produced by the host's authorization-code exchange; only `id_token` is read here.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
}

/// Trimble Identity as an OAuth2 sign-in provider.
///
/// Performs no HTTP of its own beyond fetching the JWKS; the code exchange and
/// redirects belong to the host.
#[derive(Clone)]
pub struct Strategy {
    validator: Validator,
}

impl Strategy {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self::from_validator(Validator::new(config)?))
    }

    pub fn from_validator(validator: Validator) -> Self {
        Self { validator }
    }

    pub fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn authorize_endpoint(&self) -> Result<Url> {
        let options = &self.validator.config().client_options;
        resolve_endpoint(&options.site, &options.authorize_url)
    }

    pub fn token_endpoint(&self) -> Result<Url> {
        let options = &self.validator.config().client_options;
        resolve_endpoint(&options.site, &options.token_url)
    }

    /// The configured `redirect_uri`, or `full_host` followed by `callback_path`.
    pub fn callback_url(&self, full_host: &str, callback_path: &str) -> String {
        match &self.validator.config().redirect_uri {
            Some(uri) => uri.clone(),
            None => format!("{full_host}{callback_path}"),
        }
    }

    /// Builds the authorize request parameters, passing through the allowed
    /// options the inbound request carries with a non-empty value.
    pub fn authorize_params(&self, request_params: &HashMap<String, String>) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("response_type".to_string(), RESPONSE_TYPE.to_string());
        for option in AUTHORIZE_OPTIONS {
            if let Some(value) = request_params.get(option).filter(|v| !v.is_empty()) {
                params.insert(option.to_string(), value.clone());
            }
        }
        params
    }

    /// Verifies the bundle's ID Token and maps it to the user's identity.
    ///
    /// A bundle without an ID Token yields a blank identity instead of an error.
    #[instrument(skip_all, err)]
    pub async fn authenticate(&self, tokens: &TokenResponse) -> Result<IdentityRecord> {
        let claims = self.validator.verify(tokens.id_token.as_deref()).await?;
        let identity = to_identity(&claims);
        debug!(uid = %identity.uid, "Resolved identity");
        Ok(identity)
    }
}

fn resolve_endpoint(site: &str, path: &str) -> Result<Url> {
    Url::parse(site)
        .and_then(|base| base.join(path))
        .map_err(|e| TrimbleOidcError::InvalidUrl(e.to_string()))
}
