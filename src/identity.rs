// src/identity.rs

use crate::validator::claims::VerifiedClaims;
use serde::Serialize;
use serde_json::{Map, Value};

/// The user identity handed to the host's session layer.
///
/// Recomputed from the verified claims on every request and never stored here.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdentityRecord {
    /// The provider's subject identifier, taken from `sub` unchanged.
    pub uid: String,
    pub info: IdentityInfo,
    pub extra: IdentityExtra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdentityInfo {
    /// Given and family name joined by a space.
    pub name: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdentityExtra {
    pub raw_claims: Map<String, Value>,
    /// The provider's `data_region` claim.
    pub location: Option<String>,
    pub picture: Option<String>,
}

/// Projects verified claims onto an [`IdentityRecord`]. Missing optional claims
/// become `None`, or an empty string for `name` and `email`.
pub fn to_identity(claims: &VerifiedClaims) -> IdentityRecord {
    let name = [claims.given_name.as_deref(), claims.family_name.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    IdentityRecord {
        uid: claims.sub.clone(),
        info: IdentityInfo {
            name,
            email: claims.email.clone().unwrap_or_default(),
            first_name: claims.given_name.clone(),
            last_name: claims.family_name.clone(),
        },
        extra: IdentityExtra {
            raw_claims: claims.raw().clone(),
            location: claims.data_region.clone(),
            picture: claims.picture.clone(),
        },
    }
}

impl From<&VerifiedClaims> for IdentityRecord {
    fn from(claims: &VerifiedClaims) -> Self {
        to_identity(claims)
    }
}
