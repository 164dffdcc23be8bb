//! Authorization-code issuance: authorize, log in, exchange the code for a token, fetch the
//! credential with the token.
//!
//! Login itself happens outside the adapter. Codes and tokens stay valid for as long as the
//! store keeps them.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{Map, Value as Json};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    config::BaseUrl,
    core::{
        credential::Credential,
        key::{CorrelationKey, Purpose},
        store::{get_json, put_json, CorrelationStore},
    },
    exchange::CredentialIdTemplate,
    signer::DocumentSigner,
};

pub mod error;
pub mod types;

pub use error::BridgeError;
pub use types::*;

pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";
pub const ACCESS_TOKEN_LIFETIME_SECS: u64 = 3600;

/// How long a started authorization may wait for the login to complete.
pub fn auth_session_ttl() -> Duration {
    Duration::minutes(5)
}

#[derive(Debug, Clone)]
pub struct AuthorizationBridge {
    store: Arc<dyn CorrelationStore>,
    signer: DocumentSigner,
    external_url: BaseUrl,
    credential_id: CredentialIdTemplate,
}

impl AuthorizationBridge {
    pub fn new(store: Arc<dyn CorrelationStore>, signer: DocumentSigner, external_url: BaseUrl) -> Self {
        Self {
            store,
            signer,
            external_url,
            credential_id: CredentialIdTemplate::default(),
        }
    }

    pub fn with_credential_id_template(mut self, template: CredentialIdTemplate) -> Self {
        self.credential_id = template;
        self
    }

    /// Step 1: remember the authorization request. Returns the auth-state id.
    pub async fn authorize(&self, request: AuthorizationRequest) -> Result<String, BridgeError> {
        if request.claims.is_empty()
            || request.redirect_uri.is_empty()
            || request.client_id.is_empty()
            || request.state.is_empty()
        {
            return Err(BridgeError::InvalidRequest("invalid request".into()));
        }

        let key = CorrelationKey::generate(Purpose::AuthState);
        put_json(
            self.store.as_ref(),
            &key,
            &AuthorizationSession::new(request),
        )
        .await
        .map_err(BridgeError::storage("failed to save state"))?;

        debug!("started authorization {}", key.id());
        Ok(key.id().to_owned())
    }

    /// Step 3: after login, mint a code and return the client's redirect.
    pub async fn send_authorize_response(
        &self,
        auth_state: Option<&str>,
    ) -> Result<Url, BridgeError> {
        let Some(auth_state) = auth_state.filter(|state| !state.is_empty()) else {
            return Err(BridgeError::Forbidden("invalid state".into()));
        };
        let session = self.session(auth_state).await?;
        if Utc::now() - session.created_at > auth_session_ttl() {
            warn!("authorization {auth_state} expired");
            return Err(BridgeError::InvalidRequest("invalid request".into()));
        }

        let mut redirect = Url::parse(&session.redirect_uri)
            .map_err(|_| BridgeError::Internal("failed to redirect, invalid URL".into()))?;

        let code = CorrelationKey::generate(Purpose::AuthCode);
        put_json(self.store.as_ref(), &code, auth_state)
            .await
            .map_err(BridgeError::storage("failed to save authorization code"))?;

        redirect
            .query_pairs_mut()
            .append_pair("code", code.id())
            .append_pair("state", &session.state);
        Ok(redirect)
    }

    /// Step 4: exchange an authorization code for a bearer token bound to `issuer_id`.
    pub async fn token(
        &self,
        issuer_id: &str,
        request: TokenRequest,
    ) -> Result<TokenResponse, BridgeError> {
        if request.grant_type != GRANT_TYPE_AUTHORIZATION_CODE {
            return Err(BridgeError::UnsupportedGrantType);
        }

        let auth_state: String =
            get_json(self.store.as_ref(), &CorrelationKey::auth_code(&request.code))
                .await
                .map_err(|_| BridgeError::InvalidRequest("invalid state".into()))?;
        let session = self.session(&auth_state).await?;
        if session.redirect_uri != request.redirect_uri {
            return Err(BridgeError::InvalidRequest(
                "request validation failed".into(),
            ));
        }

        let token = CorrelationKey::generate(Purpose::AccessToken);
        put_json(self.store.as_ref(), &token, issuer_id)
            .await
            .map_err(BridgeError::storage("failed to save token state"))?;

        info!(%issuer_id, "issued access token");
        Ok(TokenResponse {
            token_type: "Bearer".into(),
            access_token: token.id().to_owned(),
            expires_in: ACCESS_TOKEN_LIFETIME_SECS,
        })
    }

    /// Step 5: sign and return the stored credential of the requested type.
    pub async fn credential(
        &self,
        issuer_id: &str,
        authorization: Option<&str>,
        request: CredentialRequest,
    ) -> Result<CredentialResponse, BridgeError> {
        let format = CredentialFormat::parse(&request.format)?;

        let parts = authorization
            .unwrap_or_default()
            .split("Bearer ")
            .collect::<Vec<_>>();
        let [_, token] = parts[..] else {
            return Err(BridgeError::MalformedToken);
        };
        if token.is_empty() {
            return Err(BridgeError::Forbidden("invalid token".into()));
        }

        let token_issuer: String =
            get_json(self.store.as_ref(), &CorrelationKey::access_token(token))
                .await
                .map_err(|_| BridgeError::Forbidden("invalid token".into()))?;
        if token_issuer != issuer_id {
            return Err(BridgeError::Forbidden("invalid transaction".into()));
        }

        let mut credential: Json = get_json(
            self.store.as_ref(),
            &CorrelationKey::credential_blob(issuer_id, &request.type_),
        )
        .await
        .map_err(BridgeError::storage("failed to get credential"))?;
        if let Some(id) = self.credential_id.assign(&mut credential) {
            debug!("assigned credential id {id}");
        }
        let mut credential = Credential::try_from(credential).map_err(|e| {
            warn!("stored credential is invalid: {e:#}");
            BridgeError::Internal("failed to prepare credential".into())
        })?;

        let credential = match format {
            CredentialFormat::LdpVc => {
                self.signer
                    .sign_credential(&mut credential)
                    .await
                    .map_err(|e| {
                        warn!("failed to sign credential: {e}");
                        BridgeError::Internal("failed to issue credential".into())
                    })?;
                credential.into_json()
            }
            CredentialFormat::JwtVc => Json::String(
                self.signer
                    .sign_credential_jwt(&credential)
                    .await
                    .map_err(|e| {
                        warn!("failed to sign credential: {e}");
                        BridgeError::Internal("failed to issue JWT credential".into())
                    })?,
            ),
        };

        info!(%issuer_id, credential_type = %request.type_, "issued credential");
        Ok(CredentialResponse { format, credential })
    }

    /// Set up a token-based issuance and return the wallet URL that starts it.
    pub async fn initiate_issuance(&self, form: InitiateIssuanceForm) -> Result<Url, BridgeError> {
        let mut wallet_url = Url::parse(&form.wallet_init_issuance_url).map_err(|e| {
            BridgeError::InvalidRequest(format!("failed to parse wallet init issuance URL: {e}"))
        })?;
        let credential_manifests = match form.cred_manifest.trim() {
            "" => None,
            manifest => Some(serde_json::from_str::<Json>(manifest).map_err(|e| {
                BridgeError::InvalidRequest(format!("failed to parse credential manifest: {e}"))
            })?),
        };
        let credentials: Map<String, Json> = match form.creds_to_issue.trim() {
            "" => Map::new(),
            credentials => serde_json::from_str(credentials).map_err(|e| {
                BridgeError::InvalidRequest(format!("failed to parse credentials: {e}"))
            })?,
        };

        let issuer_id = Uuid::new_v4().to_string();
        let issuer = match form.issuer_url.trim_end_matches('/') {
            "" => self.external_url.with_segments([issuer_id.as_str()]).to_string(),
            issuer_url => format!("{issuer_url}/{issuer_id}"),
        };

        put_json(
            self.store.as_ref(),
            &CorrelationKey::issuer_config(&issuer_id),
            &IssuerConfiguration::new(issuer.clone(), credential_manifests),
        )
        .await
        .map_err(BridgeError::storage("failed to prepare issuer configuration"))?;

        for (credential_type, credential) in &credentials {
            put_json(
                self.store.as_ref(),
                &CorrelationKey::credential_blob(&issuer_id, credential_type),
                credential,
            )
            .await
            .map_err(BridgeError::storage("failed to save credential"))?;
        }

        {
            let mut query = wallet_url.query_pairs_mut();
            query.append_pair("issuer", &issuer);
            for credential_type in split_list(&form.credential_types) {
                query.append_pair("credential_type", credential_type);
            }
            for manifest_id in split_list(&form.manifest_ids) {
                query.append_pair("manifest_id", manifest_id);
            }
        }

        info!(
            %issuer_id,
            credentials = credentials.len(),
            "initiated token-based issuance"
        );
        Ok(wallet_url)
    }

    /// The well-known configuration of the issuance `issuer_id`.
    pub async fn configuration(&self, issuer_id: &str) -> Result<IssuerConfiguration, BridgeError> {
        get_json(self.store.as_ref(), &CorrelationKey::issuer_config(issuer_id))
            .await
            .map_err(|e| {
                debug!("no configuration for issuer {issuer_id}: {e}");
                BridgeError::NotFound("failed to read wellknown configuration".into())
            })
    }

    async fn session(&self, auth_state: &str) -> Result<AuthorizationSession, BridgeError> {
        get_json(self.store.as_ref(), &CorrelationKey::auth_state(auth_state))
            .await
            .map_err(|_| BridgeError::InvalidRequest("invalid request".into()))
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|item| !item.is_empty())
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::{
        core::store::MemoryStore,
        signer::{Ed25519Signer, KeyProvider},
    };

    fn bridge(store: Arc<MemoryStore>) -> AuthorizationBridge {
        AuthorizationBridge::new(
            store,
            DocumentSigner::new(Arc::new(Ed25519Signer::generate().unwrap())),
            "https://demo.example".parse().unwrap(),
        )
    }

    fn authorization_request() -> AuthorizationRequest {
        AuthorizationRequest {
            claims: r#"{"credential_type":"UniversityDegreeCredential"}"#.into(),
            scope: "openid".into(),
            state: "client-state".into(),
            response_type: "code".into(),
            client_id: "wallet".into(),
            redirect_uri: "https://wallet.example/callback".into(),
        }
    }

    fn code_from(redirect: &Url) -> String {
        redirect
            .query_pairs()
            .find(|(name, _)| name == "code")
            .map(|(_, code)| code.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn authorize_requires_the_basic_parameters() {
        let bridge = bridge(Arc::new(MemoryStore::default()));
        for strip in ["claims", "redirect_uri", "client_id", "state"] {
            let mut request = authorization_request();
            match strip {
                "claims" => request.claims.clear(),
                "redirect_uri" => request.redirect_uri.clear(),
                "client_id" => request.client_id.clear(),
                _ => request.state.clear(),
            }
            assert!(matches!(
                bridge.authorize(request).await,
                Err(BridgeError::InvalidRequest(_))
            ));
        }
    }

    #[tokio::test]
    async fn authorize_response_needs_a_known_state() {
        let bridge = bridge(Arc::new(MemoryStore::default()));

        let err = bridge.send_authorize_response(None).await.unwrap_err();
        assert_eq!(http::StatusCode::FORBIDDEN, err.status());
        assert_eq!("invalid state", err.to_string());

        let err = bridge
            .send_authorize_response(Some("unknown"))
            .await
            .unwrap_err();
        assert_eq!(http::StatusCode::BAD_REQUEST, err.status());
        assert_eq!("invalid request", err.to_string());
    }

    #[tokio::test]
    async fn expired_authorization_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let bridge = bridge(store.clone());
        let mut session = AuthorizationSession::new(authorization_request());
        session.created_at = Utc::now() - Duration::minutes(6);
        put_json(store.as_ref(), &CorrelationKey::auth_state("old"), &session)
            .await
            .unwrap();

        assert!(matches!(
            bridge.send_authorize_response(Some("old")).await,
            Err(BridgeError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn code_redirect_keeps_the_client_state() {
        let bridge = bridge(Arc::new(MemoryStore::default()));
        let auth_state = bridge.authorize(authorization_request()).await.unwrap();

        let redirect = bridge
            .send_authorize_response(Some(&auth_state))
            .await
            .unwrap();

        assert!(redirect
            .as_str()
            .starts_with("https://wallet.example/callback?code="));
        assert!(redirect
            .query_pairs()
            .any(|(name, value)| name == "state" && value == "client-state"));
    }

    #[tokio::test]
    async fn token_checks_grant_type_code_and_redirect() {
        let bridge = bridge(Arc::new(MemoryStore::default()));
        let auth_state = bridge.authorize(authorization_request()).await.unwrap();
        let code = code_from(
            &bridge
                .send_authorize_response(Some(&auth_state))
                .await
                .unwrap(),
        );

        let request = |code: &str, redirect_uri: &str, grant_type: &str| TokenRequest {
            code: code.into(),
            redirect_uri: redirect_uri.into(),
            grant_type: grant_type.into(),
        };

        assert!(matches!(
            bridge
                .token("issuer-1", request(&code, "https://wallet.example/callback", "implicit"))
                .await,
            Err(BridgeError::UnsupportedGrantType)
        ));
        assert!(matches!(
            bridge
                .token("issuer-1", request(&code, "https://evil.example", "authorization_code"))
                .await,
            Err(BridgeError::InvalidRequest(_))
        ));

        let token = bridge
            .token(
                "issuer-1",
                request(&code, "https://wallet.example/callback", "authorization_code"),
            )
            .await
            .unwrap();
        assert_eq!("Bearer", token.token_type);
        assert_eq!(3600, token.expires_in);
    }

    #[tokio::test]
    async fn credential_token_checks() {
        let store = Arc::new(MemoryStore::default());
        let bridge = bridge(store.clone());
        put_json(store.as_ref(), &CorrelationKey::access_token("tok"), "issuer-1")
            .await
            .unwrap();
        let request = || CredentialRequest {
            format: "ldp_vc".into(),
            type_: "UniversityDegreeCredential".into(),
        };

        let err = bridge
            .credential("issuer-1", None, request())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::MalformedToken));

        let err = bridge
            .credential("issuer-1", Some("Bearer "), request())
            .await
            .unwrap_err();
        assert_eq!("invalid token", err.to_string());

        let err = bridge
            .credential("issuer-1", Some("Bearer nope"), request())
            .await
            .unwrap_err();
        assert_eq!(http::StatusCode::FORBIDDEN, err.status());

        let err = bridge
            .credential("issuer-2", Some("Bearer tok"), request())
            .await
            .unwrap_err();
        assert_eq!("invalid transaction", err.to_string());

        let err = bridge
            .credential("issuer-1", Some("Bearer tok"), request())
            .await
            .unwrap_err();
        assert_eq!(http::StatusCode::INTERNAL_SERVER_ERROR, err.status());
        assert_eq!("failed to get credential", err.to_string());
    }

    #[tokio::test]
    async fn initiate_issuance_stores_configuration_and_credentials() {
        let store = Arc::new(MemoryStore::default());
        let bridge = bridge(store.clone());
        let form = InitiateIssuanceForm {
            wallet_init_issuance_url: "https://wallet.example/initiate".into(),
            credential_types: "UniversityDegreeCredential,PermanentResidentCard".into(),
            manifest_ids: "m1,m2".into(),
            issuer_url: String::new(),
            cred_manifest: json!([{"id": "m1", "output_descriptors": []}]).to_string(),
            creds_to_issue: json!({"UniversityDegreeCredential": {"id": "c1"}}).to_string(),
        };

        let redirect = bridge.initiate_issuance(form).await.unwrap();
        let pairs = redirect.query_pairs().into_owned().collect::<Vec<_>>();
        let issuer = pairs
            .iter()
            .find(|(name, _)| name == "issuer")
            .map(|(_, value)| value.clone())
            .unwrap();
        assert_eq!(
            2,
            pairs
                .iter()
                .filter(|(name, _)| name == "credential_type")
                .count()
        );
        assert_eq!(
            vec!["m1", "m2"],
            pairs
                .iter()
                .filter(|(name, _)| name == "manifest_id")
                .map(|(_, value)| value.as_str())
                .collect::<Vec<_>>()
        );

        let issuer_id = issuer.strip_prefix("https://demo.example/").unwrap();
        let configuration = bridge.configuration(issuer_id).await.unwrap();
        assert_eq!(issuer, configuration.issuer);
        assert_eq!(
            format!("{issuer}/issuer/oidc/token"),
            configuration.token_endpoint
        );
        assert!(store
            .get(&format!(
                "cred_store_{issuer_id}_UniversityDegreeCredential"
            ))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn empty_format_is_answered_as_ldp_vc() {
        let store = Arc::new(MemoryStore::default());
        let signer = DocumentSigner::new(Arc::new(Ed25519Signer::generate().unwrap()));
        let bridge = AuthorizationBridge::new(
            store.clone(),
            signer.clone(),
            "https://demo.example".parse().unwrap(),
        );
        put_json(store.as_ref(), &CorrelationKey::access_token("tok"), "issuer-1")
            .await
            .unwrap();
        put_json(
            store.as_ref(),
            &CorrelationKey::credential_blob("issuer-1", "UniversityDegreeCredential"),
            &json!({
                "@context": [
                    "https://www.w3.org/2018/credentials/v1",
                    "https://www.w3.org/2018/credentials/examples/v1"
                ],
                "id": "{{credential_id}}",
                "type": ["VerifiableCredential", "UniversityDegreeCredential"],
                "issuer": "did:example:issuer",
                "issuanceDate": "2022-01-01T00:00:00Z",
                "credentialSubject": {"id": "did:example:holder", "degree": {"type": "BachelorDegree"}}
            }),
        )
        .await
        .unwrap();

        let response = bridge
            .credential(
                "issuer-1",
                Some("Bearer tok"),
                CredentialRequest {
                    format: String::new(),
                    type_: "UniversityDegreeCredential".into(),
                },
            )
            .await
            .unwrap();

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(json!("ldp_vc"), body["format"]);
        let credential = Credential::try_from(response.credential).unwrap();
        assert!(credential.id().unwrap().starts_with("urn:uuid:"));
        signer.verify_credential(&credential).await.unwrap();
    }

    #[tokio::test]
    async fn jwt_credential_is_signed_by_the_adapter() {
        let store = Arc::new(MemoryStore::default());
        let provider = Arc::new(Ed25519Signer::generate().unwrap());
        let bridge = AuthorizationBridge::new(
            store.clone(),
            DocumentSigner::new(provider.clone()),
            "https://demo.example".parse().unwrap(),
        );
        put_json(store.as_ref(), &CorrelationKey::access_token("tok"), "issuer-1")
            .await
            .unwrap();
        put_json(
            store.as_ref(),
            &CorrelationKey::credential_blob("issuer-1", "PermanentResidentCard"),
            &json!({
                "@context": ["https://www.w3.org/2018/credentials/v1"],
                "type": ["VerifiableCredential", "PermanentResidentCard"],
                "issuer": "did:example:issuer",
                "credentialSubject": {"id": "did:example:holder"}
            }),
        )
        .await
        .unwrap();

        let response = bridge
            .credential(
                "issuer-1",
                Some("Bearer tok"),
                CredentialRequest {
                    format: "jwt_vc".into(),
                    type_: "PermanentResidentCard".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(CredentialFormat::JwtVc, response.format);
        let token = response.credential.as_str().unwrap();
        let claims = crate::signer::jwt::verify(&provider.jwk().to_public(), token).unwrap();
        assert_eq!(json!("did:example:holder"), claims["sub"]);
    }
}
