// src/validator/claims.rs

use crate::error::{Result, TrimbleOidcError};
use serde_json::{Map, Value};

/// Claims every ID Token must carry.
pub const REQUIRED_CLAIMS: [&str; 3] = ["exp", "iss", "sub"];

/// The claims of an ID Token that passed signature and policy checks.
///
/// The named fields are the claims this crate reads; [`VerifiedClaims::raw`]
/// keeps the whole payload, including anything the provider adds later.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifiedClaims {
    pub sub: String,
    pub iss: String,
    pub exp: i64,
    pub iat: Option<i64>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email: Option<String>,
    pub data_region: Option<String>,
    pub picture: Option<String>,
    raw: Map<String, Value>,
}

impl VerifiedClaims {
    /// The result for a callback that carried no ID Token at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no claims were verified (see [`VerifiedClaims::empty`]).
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The full payload exactly as the provider signed it.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn into_raw(self) -> Map<String, Value> {
        self.raw
    }

    /// Extracts the named claims from a decoded payload.
    ///
    /// Required claims must be present with the right type. Optional claims of
    /// an unexpected type are left out of the named fields but stay in `raw`.
    pub(crate) fn from_payload(raw: Map<String, Value>) -> Result<Self> {
        if let Some(name) = missing_required_claim(&raw) {
            return Err(TrimbleOidcError::MissingRequiredClaim(name.to_string()));
        }

        Ok(Self {
            sub: required_string(&raw, "sub")?,
            iss: required_string(&raw, "iss")?,
            exp: numeric_date(&raw, "exp")?.unwrap_or_default(),
            iat: numeric_date(&raw, "iat")?,
            given_name: optional_string(&raw, "given_name"),
            family_name: optional_string(&raw, "family_name"),
            email: optional_string(&raw, "email"),
            data_region: optional_string(&raw, "data_region"),
            picture: optional_string(&raw, "picture"),
            raw,
        })
    }
}

/// A claim counts as missing when it is absent or `null`.
pub(crate) fn missing_required_claim(raw: &Map<String, Value>) -> Option<&'static str> {
    REQUIRED_CLAIMS
        .into_iter()
        .find(|name| matches!(raw.get(*name), None | Some(Value::Null)))
}

fn required_string(raw: &Map<String, Value>, name: &str) -> Result<String> {
    match raw.get(name) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(Value::Null) | None => Err(TrimbleOidcError::MissingRequiredClaim(name.to_string())),
        Some(_) => Err(TrimbleOidcError::Decode(format!("claim '{name}' must be a string"))),
    }
}

fn optional_string(raw: &Map<String, Value>, name: &str) -> Option<String> {
    raw.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Reads an RFC 7519 NumericDate, accepting integer or fractional seconds.
fn numeric_date(raw: &Map<String, Value>, name: &str) -> Result<Option<i64>> {
    match raw.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| TrimbleOidcError::Decode(format!("claim '{name}' is out of range"))),
        Some(_) => Err(TrimbleOidcError::Decode(format!("claim '{name}' must be a number"))),
    }
}
