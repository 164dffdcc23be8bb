//! Out-of-band invitations that start a WACI interaction.

use std::sync::Arc;

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, info};
use uuid::Uuid;

use super::Error;
use crate::core::{
    key::CorrelationKey,
    presentation_definition::PresentationDefinition,
    record::ExchangeRecord,
    store::{put_json, CorrelationStore},
};

pub const OUT_OF_BAND_INVITATION: &str = "https://didcomm.org/out-of-band/1.0/invitation";
pub const OUT_OF_BAND_INVITATION_V2: &str = "https://didcomm.org/out-of-band/2.0/invitation";
pub const DIDEXCHANGE_PROTOCOL: &str = "https://didcomm.org/didexchange/1.0";
pub const ACCEPTED_PROFILES: [&str; 2] = ["didcomm/aip2;env=rfc19", "didcomm/aip1"];
pub const DIDCOMM_V2_PROFILE: &str = "didcomm/v2";
pub const AIP2_RFC587_PROFILE: &str = "didcomm/aip2;env=rfc587";

/// What the holder is invited to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    IssueCredential,
    SharePresentation,
}

impl Goal {
    pub fn goal(&self) -> &'static str {
        match self {
            Goal::IssueCredential => "issue-vc",
            Goal::SharePresentation => "share-vp",
        }
    }

    pub fn goal_code(&self) -> &'static str {
        match self {
            Goal::IssueCredential => "streamlined-vc",
            Goal::SharePresentation => "streamlined-vp",
        }
    }

    /// Media type profiles a DIDComm v2 invitation for this goal accepts.
    pub fn v2_profiles(&self) -> &'static [&'static str] {
        match self {
            Goal::IssueCredential => &[DIDCOMM_V2_PROFILE],
            Goal::SharePresentation => &[DIDCOMM_V2_PROFILE, AIP2_RFC587_PROFILE],
        }
    }
}

/// An invitation the holder's wallet receives through a redirect.
pub trait OutOfBand: Serialize {
    fn id(&self) -> &str;

    /// The wallet URL that hands this invitation to the holder:
    /// `{wallet_url}/waci?oob=<base64url(invitation)>`.
    fn wallet_redirect(&self, wallet_url: &str) -> Result<String, Error> {
        let invitation = serde_json::to_vec(self)
            .map_err(|e| Error::Validation(format!("failed to encode invitation: {e}")))?;
        Ok(format!(
            "{}/waci?oob={}",
            wallet_url.trim_end_matches('/'),
            BASE64_URL_SAFE.encode(invitation)
        ))
    }
}

/// An out-of-band invitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub goal: String,
    pub goal_code: String,
    pub accept: Vec<String>,
    pub handshake_protocols: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Json>,
}

impl Invitation {
    pub fn new(goal: Goal) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            type_: OUT_OF_BAND_INVITATION.into(),
            label: None,
            goal: goal.goal().into(),
            goal_code: goal.goal_code().into(),
            accept: ACCEPTED_PROFILES.iter().map(|p| p.to_string()).collect(),
            handshake_protocols: vec![DIDEXCHANGE_PROTOCOL.into()],
            services: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_services(mut self, services: Vec<Json>) -> Self {
        self.services = services;
        self
    }
}

impl OutOfBand for Invitation {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A DIDComm v2 out-of-band invitation, sent `from` the adapter's DID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationV2 {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub from: String,
    pub body: InvitationBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationBody {
    pub goal: String,
    pub goal_code: String,
    pub accept: Vec<String>,
}

impl InvitationV2 {
    pub fn new(goal: Goal, from: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            type_: OUT_OF_BAND_INVITATION_V2.into(),
            from: from.into(),
            body: InvitationBody {
                goal: goal.goal().into(),
                goal_code: goal.goal_code().into(),
                accept: goal.v2_profiles().iter().map(|p| p.to_string()).collect(),
            },
        }
    }
}

impl OutOfBand for InvitationV2 {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Form submitted by the issuer page to start a WACI issuance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssuanceForm {
    #[serde(rename = "credManifest", default)]
    pub cred_manifest: String,
    #[serde(default)]
    pub response: String,
    #[serde(rename = "credToIssue", default)]
    pub cred_to_issue: String,
    #[serde(rename = "walletURL", default)]
    pub wallet_url: String,
}

/// Form submitted by the verifier page to start a WACI share.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShareForm {
    #[serde(rename = "pEx", default)]
    pub presentation_definition: String,
    #[serde(rename = "walletURL", default)]
    pub wallet_url: String,
}

/// Creates invitations and persists the record each interaction is correlated with.
#[derive(Debug, Clone)]
pub struct Initiator {
    store: Arc<dyn CorrelationStore>,
    label: Option<String>,
    services: Vec<Json>,
    did: Option<String>,
}

impl Initiator {
    pub fn new(store: Arc<dyn CorrelationStore>) -> Self {
        Self {
            store,
            label: None,
            services: Vec::new(),
            did: None,
        }
    }

    /// The DID DIDComm v2 invitations are sent from.
    pub fn with_did(mut self, did: impl Into<String>) -> Self {
        self.did = Some(did.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// DIDComm services advertised in every invitation.
    pub fn with_services(mut self, services: Vec<Json>) -> Self {
        self.services = services;
        self
    }

    /// Start an issuance: store the manifest, response and credential under the invitation
    /// id and return the invitation with its wallet redirect.
    pub async fn initiate_issuance(
        &self,
        form: &IssuanceForm,
    ) -> Result<(Invitation, String), Error> {
        let invitation = self.invitation(Goal::IssueCredential);
        self.initiate(invitation, issuance_record(form)?, &form.wallet_url)
            .await
    }

    /// [Initiator::initiate_issuance] with a DIDComm v2 invitation.
    pub async fn initiate_issuance_v2(
        &self,
        form: &IssuanceForm,
    ) -> Result<(InvitationV2, String), Error> {
        let invitation = self.invitation_v2(Goal::IssueCredential)?;
        self.initiate(invitation, issuance_record(form)?, &form.wallet_url)
            .await
    }

    /// Start a share: store the presentation definition under the invitation id and return
    /// the invitation with its wallet redirect.
    pub async fn initiate_share(&self, form: &ShareForm) -> Result<(Invitation, String), Error> {
        let invitation = self.invitation(Goal::SharePresentation);
        self.initiate(invitation, share_record(form)?, &form.wallet_url)
            .await
    }

    /// [Initiator::initiate_share] with a DIDComm v2 invitation.
    pub async fn initiate_share_v2(
        &self,
        form: &ShareForm,
    ) -> Result<(InvitationV2, String), Error> {
        let invitation = self.invitation_v2(Goal::SharePresentation)?;
        self.initiate(invitation, share_record(form)?, &form.wallet_url)
            .await
    }

    fn invitation(&self, goal: Goal) -> Invitation {
        let invitation = Invitation::new(goal).with_services(self.services.clone());
        match &self.label {
            Some(label) => invitation.with_label(label.clone()),
            None => invitation,
        }
    }

    fn invitation_v2(&self, goal: Goal) -> Result<InvitationV2, Error> {
        let did = self.did.as_deref().ok_or_else(|| {
            Error::Validation("no DID to send DIDComm v2 invitations from".into())
        })?;
        Ok(InvitationV2::new(goal, did))
    }

    async fn initiate<I: OutOfBand>(
        &self,
        invitation: I,
        record: ExchangeRecord,
        wallet_url: &str,
    ) -> Result<(I, String), Error> {
        if wallet_url.is_empty() {
            return Err(Error::Validation("walletURL is required".into()));
        }

        put_json(
            self.store.as_ref(),
            &CorrelationKey::issuance_data(invitation.id()),
            &record,
        )
        .await?;
        debug!("stored exchange record for invitation {}", invitation.id());

        let redirect = invitation.wallet_redirect(wallet_url)?;
        info!(invitation_id = %invitation.id(), "created out-of-band invitation");
        Ok((invitation, redirect))
    }
}

fn issuance_record(form: &IssuanceForm) -> Result<ExchangeRecord, Error> {
    Ok(ExchangeRecord {
        credential_manifest: parse_optional("credManifest", &form.cred_manifest)?,
        credential_response: parse_optional("response", &form.response)?,
        credential: parse_optional("credToIssue", &form.cred_to_issue)?,
        ..Default::default()
    })
}

fn share_record(form: &ShareForm) -> Result<ExchangeRecord, Error> {
    let definition = PresentationDefinition::from_slice(form.presentation_definition.as_bytes())
        .map_err(|e| Error::decode("pEx", e))?;
    Ok(ExchangeRecord {
        presentation_definition: Some(definition.into()),
        ..Default::default()
    })
}

fn parse_optional(field: &str, value: &str) -> Result<Option<Json>, Error> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(value)
        .map(Some)
        .map_err(|e| Error::Decode(format!("{field}: {e}")))
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::core::store::MemoryStore;

    #[test]
    fn redirect_carries_the_invitation() {
        let invitation = Invitation::new(Goal::SharePresentation);
        let redirect = invitation
            .wallet_redirect("https://wallet.example/")
            .unwrap();

        let oob = redirect
            .strip_prefix("https://wallet.example/waci?oob=")
            .unwrap();
        let decoded: Invitation =
            serde_json::from_slice(&BASE64_URL_SAFE.decode(oob).unwrap()).unwrap();
        assert_eq!(invitation, decoded);
        assert_eq!("share-vp", decoded.goal);
        assert_eq!("streamlined-vp", decoded.goal_code);
    }

    #[tokio::test]
    async fn issuance_record_is_stored_under_invitation_id() {
        let store = Arc::new(MemoryStore::default());
        let initiator = Initiator::new(store.clone());
        let form = IssuanceForm {
            cred_manifest: json!({"id": "m", "output_descriptors": []}).to_string(),
            response: json!({"credential_response": {"id": "r"}}).to_string(),
            cred_to_issue: String::new(),
            wallet_url: "https://wallet.example".into(),
        };

        let (invitation, _) = initiator.initiate_issuance(&form).await.unwrap();
        assert_eq!("issue-vc", invitation.goal);

        let record = ExchangeRecord::load(store.as_ref(), &invitation.id)
            .await
            .unwrap();
        assert_eq!(Some(json!({"id": "m", "output_descriptors": []})), record.credential_manifest);
        assert_eq!(None, record.credential);
    }

    #[tokio::test]
    async fn share_requires_a_presentation_definition() {
        let store = Arc::new(MemoryStore::default());
        let initiator = Initiator::new(store.clone());
        let form = ShareForm {
            presentation_definition: "{}".into(),
            wallet_url: "https://wallet.example".into(),
        };

        let err = initiator.initiate_share(&form).await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn v2_invitation_is_sent_from_the_adapter_did() {
        let store = Arc::new(MemoryStore::default());
        let initiator = Initiator::new(store.clone()).with_did("did:key:z6MkAdapter");
        let form = ShareForm {
            presentation_definition: json!({"id": "pd", "input_descriptors": []}).to_string(),
            wallet_url: "https://wallet.example".into(),
        };

        let (invitation, redirect) = initiator.initiate_share_v2(&form).await.unwrap();

        let oob = redirect
            .strip_prefix("https://wallet.example/waci?oob=")
            .unwrap();
        let decoded: Json = serde_json::from_slice(&BASE64_URL_SAFE.decode(oob).unwrap()).unwrap();
        assert_eq!(
            json!({
                "id": invitation.id,
                "type": OUT_OF_BAND_INVITATION_V2,
                "from": "did:key:z6MkAdapter",
                "body": {
                    "goal": "share-vp",
                    "goal_code": "streamlined-vp",
                    "accept": ["didcomm/v2", "didcomm/aip2;env=rfc587"]
                }
            }),
            decoded
        );
        let record = ExchangeRecord::load(store.as_ref(), &invitation.id)
            .await
            .unwrap();
        assert_eq!(Some(json!({"id": "pd", "input_descriptors": []})), record.presentation_definition);
    }

    #[tokio::test]
    async fn v2_invitation_needs_a_did() {
        let store = Arc::new(MemoryStore::default());
        let form = IssuanceForm {
            wallet_url: "https://wallet.example".into(),
            ..Default::default()
        };

        let err = Initiator::new(store.clone())
            .initiate_issuance_v2(&form)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.is_empty().await);

        let (invitation, _) = Initiator::new(store.clone())
            .with_did("did:key:z6MkAdapter")
            .initiate_issuance_v2(&form)
            .await
            .unwrap();
        assert_eq!(vec!["didcomm/v2".to_owned()], invitation.body.accept);
        assert_eq!("issue-vc", invitation.body.goal);
    }

    #[tokio::test]
    async fn issuance_rejects_malformed_json() {
        let initiator = Initiator::new(Arc::new(MemoryStore::default()));
        let form = IssuanceForm {
            cred_manifest: "{not json".into(),
            wallet_url: "https://wallet.example".into(),
            ..Default::default()
        };
        assert!(matches!(
            initiator.initiate_issuance(&form).await,
            Err(Error::Decode(_))
        ));
    }
}
