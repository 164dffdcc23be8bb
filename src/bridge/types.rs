use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::BridgeError;

/// Query of the authorization endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AuthorizationRequest {
    #[serde(default)]
    pub claims: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub response_type: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
}

/// A pending authorization, stored under its auth-state id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationSession {
    pub claims: String,
    pub scope: String,
    pub state: String,
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
}

impl AuthorizationSession {
    pub fn new(request: AuthorizationRequest) -> Self {
        Self {
            claims: request.claims,
            scope: request.scope,
            state: request.state,
            response_type: request.response_type,
            client_id: request.client_id,
            redirect_uri: request.redirect_uri,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub grant_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CredentialRequest {
    #[serde(default)]
    pub format: String,
    #[serde(rename = "type", default)]
    pub type_: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialFormat {
    #[serde(rename = "ldp_vc")]
    LdpVc,
    #[serde(rename = "jwt_vc")]
    JwtVc,
}

impl CredentialFormat {
    /// An empty format asks for the default, a linked-data proof credential.
    pub fn parse(format: &str) -> Result<Self, BridgeError> {
        match format {
            "" | "ldp_vc" => Ok(CredentialFormat::LdpVc),
            "jwt_vc" => Ok(CredentialFormat::JwtVc),
            _ => Err(BridgeError::UnsupportedFormat),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub format: CredentialFormat,
    /// A JSON-LD credential for `ldp_vc`, a compact JWT string for `jwt_vc`.
    pub credential: Json,
}

/// Form of the page that starts a token-based issuance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitiateIssuanceForm {
    #[serde(rename = "walletInitIssuanceURL", default)]
    pub wallet_init_issuance_url: String,
    /// Comma separated.
    #[serde(rename = "credentialTypes", default)]
    pub credential_types: String,
    /// Comma separated.
    #[serde(rename = "manifestIDs", default)]
    pub manifest_ids: String,
    #[serde(rename = "issuerURL", default)]
    pub issuer_url: String,
    #[serde(rename = "credManifest", default)]
    pub cred_manifest: String,
    /// A JSON object mapping each credential type to the credential to issue.
    #[serde(rename = "credsToIssue", default)]
    pub creds_to_issue: String,
}

/// The well-known configuration of one token-based issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerConfiguration {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub credential_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_manifests: Option<Json>,
}

impl IssuerConfiguration {
    pub fn new(issuer: String, credential_manifests: Option<Json>) -> Self {
        Self {
            authorization_endpoint: format!("{issuer}/issuer/oidc/authorize"),
            token_endpoint: format!("{issuer}/issuer/oidc/token"),
            credential_endpoint: format!("{issuer}/issuer/oidc/credential"),
            issuer,
            credential_manifests,
        }
    }
}
