use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use ssi::jwk::{Algorithm, JWK};

use super::{KeyProvider, SignerError};
use crate::core::credential::Credential;

/// The registered claims of a VC-JWT, with the credential itself under `vc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    pub nbf: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    pub vc: Json,
}

impl CredentialClaims {
    pub fn from_credential(credential: &Credential) -> Self {
        let issued = credential
            .issuance_date()
            .unwrap_or_else(Utc::now)
            .timestamp();
        Self {
            iss: credential.issuer().map(ToOwned::to_owned),
            sub: credential.subject_id().map(ToOwned::to_owned),
            jti: credential.id().map(ToOwned::to_owned),
            nbf: issued,
            iat: issued,
            exp: credential.expiration_date().map(|date| date.timestamp()),
            vc: credential.clone().into_json(),
        }
    }
}

/// Sign `claims` as a compact JWS whose header names the key in `kid`.
pub(crate) fn encode<T>(provider: &dyn KeyProvider, claims: &T) -> Result<String, SignerError>
where
    T: Serialize,
{
    ssi::claims::jwt::encode_sign(Algorithm::EdDSA, claims, provider.jwk())
        .map_err(|e| SignerError::Signing(e.to_string()))
}

/// Verify a compact JWS made by [encode] against `jwk` and return its claims.
pub fn verify(jwk: &JWK, token: &str) -> Result<Json, SignerError> {
    ssi::claims::jwt::decode_verify(token, jwk)
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))
}
