// src/error.rs

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = TrimbleOidcError> = std::result::Result<T, E>;

/// The primary error type for the `trimble-oidc` library.
///
/// Every verification failure has its own variant so callers can tell an expired
/// token apart from a forged one or from an unreachable key provider.
#[derive(Debug, Error)]
pub enum TrimbleOidcError {
    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The token is structurally malformed: wrong segment count, bad base64url,
    /// non-JSON header or payload, or a claim of the wrong type.
    #[error("Failed to decode token: {0}")]
    Decode(String),

    /// The header names an algorithm other than the pinned one (this includes `none`
    /// and every symmetric algorithm).
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The JWT header is missing the required 'kid' (Key ID) field.
    #[error("The JWT header is missing the 'kid' (Key ID) field")]
    MissingKeyId,

    /// No key with the specified 'kid' exists in the key set, even after a forced refresh.
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),

    /// A JWK in the provider's key set cannot be used for signature verification.
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// The signature does not match the header and payload under the resolved key.
    #[error("Signature verification failed")]
    InvalidSignature,

    /// A required claim is missing from the token.
    #[error("A required claim is missing from the token: {0}")]
    MissingRequiredClaim(String),

    /// The `iss` claim is not the configured issuer.
    #[error("Invalid issuer. Expected: {expected}, Actual: {actual}")]
    InvalidIssuer { expected: String, actual: String },

    /// The `exp` claim lies in the past, beyond the configured leeway.
    #[error("The token has expired")]
    ExpiredSignature,

    /// The `iat` claim lies in the future, beyond the configured leeway.
    #[error("The token was issued in the future")]
    IssuedInFuture,

    /// The JWKS request failed at the transport level (connect, TLS, timeout).
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The JWKS endpoint answered with a non-success status.
    #[error("JWKS endpoint returned status {status}")]
    JwksUnavailable { status: u16 },

    /// The JWKS endpoint returned a body that is not a key-set document.
    #[error("Malformed JWKS document: {0}")]
    InvalidJwks(String),
}

impl TrimbleOidcError {
    /// True for malformed tokens and disallowed algorithms.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::UnsupportedAlgorithm(_))
    }

    /// True when no usable signing key could be selected for the token.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::MissingKeyId | Self::KeyNotFound(_))
    }

    /// True when retrieving the provider's key set failed.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Self::HttpError(_) | Self::JwksUnavailable { .. } | Self::InvalidJwks(_)
        )
    }
}
