use std::fmt;

use uuid::Uuid;

/// The namespace a [CorrelationKey] belongs to.
///
/// The same raw identifier may appear under two different purposes without
/// colliding, since the purpose prefix is part of the stored key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// An [ExchangeRecord](super::record::ExchangeRecord), keyed by invitation or thread id.
    IssuanceData,
    /// A pending authorization request, keyed by the auth-state id.
    AuthState,
    /// An authorization code, mapping to the auth-state id it was minted for.
    AuthCode,
    /// A bearer access token, mapping to the issuer id it was minted for.
    AccessToken,
    /// An unsigned credential waiting to be fetched from the credential endpoint.
    CredentialBlob,
    /// The well-known configuration of a token-based issuance.
    IssuerConfig,
    /// The final artifact of a completed interaction, keyed by thread id.
    InteractionOutcome,
}

impl Purpose {
    pub fn prefix(&self) -> &'static str {
        match self {
            Purpose::IssuanceData => "issuance_data_",
            Purpose::AuthState => "authstate_",
            Purpose::AuthCode => "authcode_",
            Purpose::AccessToken => "access_token_",
            Purpose::CredentialBlob => "cred_store_",
            Purpose::IssuerConfig => "issuer_config_",
            Purpose::InteractionOutcome => "interaction_outcome_",
        }
    }
}

/// A namespaced key into the [CorrelationStore](super::store::CorrelationStore).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    purpose: Purpose,
    id: String,
}

impl CorrelationKey {
    pub fn new(purpose: Purpose, id: impl Into<String>) -> Self {
        Self {
            purpose,
            id: id.into(),
        }
    }

    /// A key under `purpose` with a freshly generated identifier.
    pub fn generate(purpose: Purpose) -> Self {
        Self::new(purpose, Uuid::new_v4().to_string())
    }

    pub fn issuance_data(id: impl Into<String>) -> Self {
        Self::new(Purpose::IssuanceData, id)
    }

    pub fn auth_state(id: impl Into<String>) -> Self {
        Self::new(Purpose::AuthState, id)
    }

    pub fn auth_code(code: impl Into<String>) -> Self {
        Self::new(Purpose::AuthCode, code)
    }

    pub fn access_token(token: impl Into<String>) -> Self {
        Self::new(Purpose::AccessToken, token)
    }

    /// The stored credential of type `credential_type` for the issuance `issuer_id`.
    pub fn credential_blob(issuer_id: &str, credential_type: &str) -> Self {
        Self::new(
            Purpose::CredentialBlob,
            format!("{issuer_id}_{credential_type}"),
        )
    }

    pub fn issuer_config(issuer_id: impl Into<String>) -> Self {
        Self::new(Purpose::IssuerConfig, issuer_id)
    }

    pub fn interaction_outcome(thread_id: impl Into<String>) -> Self {
        Self::new(Purpose::InteractionOutcome, thread_id)
    }

    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    /// The raw identifier, without the purpose prefix.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The string form used as the storage key.
    pub fn as_storage_key(&self) -> String {
        format!("{}{}", self.purpose.prefix(), self.id)
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.purpose.prefix(), self.id)
    }
}
