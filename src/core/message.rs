//! DIDComm protocol messages exchanged with the holder's wallet.
//!
//! Inbound messages are kept untyped: the adapter only ever needs the type tag, the
//! identifiers used for correlation and, for credential proposals, the invitation reference.
//! Outbound messages are the Aries `present-proof/2.0` and `issue-credential/2.0` shapes.

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use uuid::Uuid;

pub const DIDEXCHANGE_REQUEST: &str = "https://didcomm.org/didexchange/1.0/request";

pub const PROPOSE_PRESENTATION_V2: &str = "https://didcomm.org/present-proof/2.0/propose-presentation";
pub const PROPOSE_PRESENTATION_V3: &str = "https://didcomm.org/present-proof/3.0/propose-presentation";
pub const REQUEST_PRESENTATION_V2: &str = "https://didcomm.org/present-proof/2.0/request-presentation";
pub const PRESENTATION_V2: &str = "https://didcomm.org/present-proof/2.0/presentation";
pub const PRESENTATION_V3: &str = "https://didcomm.org/present-proof/3.0/presentation";

pub const PROPOSE_CREDENTIAL_V2: &str = "https://didcomm.org/issue-credential/2.0/propose-credential";
pub const PROPOSE_CREDENTIAL_V3: &str = "https://didcomm.org/issue-credential/3.0/propose-credential";
pub const OFFER_CREDENTIAL_V2: &str = "https://didcomm.org/issue-credential/2.0/offer-credential";
pub const REQUEST_CREDENTIAL_V2: &str = "https://didcomm.org/issue-credential/2.0/request-credential";
pub const REQUEST_CREDENTIAL_V3: &str = "https://didcomm.org/issue-credential/3.0/request-credential";
pub const ISSUE_CREDENTIAL_V2: &str = "https://didcomm.org/issue-credential/2.0/issue-credential";

pub const CREDENTIAL_MANIFEST_FORMAT: &str = "dif/credential-manifest/manifest@v1.0";
pub const CREDENTIAL_RESPONSE_FORMAT: &str = "dif/credential-manifest/response@v1.0";

/// The message types the adapter reacts to.
///
/// Protocol versions 2.0 and 3.0 map to the same variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    DidExchangeRequest,
    ProposePresentation,
    Presentation,
    ProposeCredential,
    RequestCredential,
    Other(String),
}

impl MessageType {
    pub fn from_uri(uri: &str) -> Self {
        match uri {
            DIDEXCHANGE_REQUEST => Self::DidExchangeRequest,
            PROPOSE_PRESENTATION_V2 | PROPOSE_PRESENTATION_V3 => Self::ProposePresentation,
            PRESENTATION_V2 | PRESENTATION_V3 => Self::Presentation,
            PROPOSE_CREDENTIAL_V2 | PROPOSE_CREDENTIAL_V3 => Self::ProposeCredential,
            REQUEST_CREDENTIAL_V2 | REQUEST_CREDENTIAL_V3 => Self::RequestCredential,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// A message received from the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InboundMessage(Map<String, Json>);

impl InboundMessage {
    pub fn new(map: Map<String, Json>) -> Self {
        Self(map)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("message is not a JSON object")
    }

    /// The type URI, read from `@type` (DIDComm v1) or `type` (DIDComm v2).
    pub fn type_uri(&self) -> &str {
        self.str_field("@type")
            .or_else(|| self.str_field("type"))
            .unwrap_or_default()
    }

    pub fn message_type(&self) -> MessageType {
        MessageType::from_uri(self.type_uri())
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field("@id").or_else(|| self.str_field("id"))
    }

    /// The protocol thread this message belongs to.
    ///
    /// The first message of a thread carries no thread decorator, in which case its own id is
    /// the thread id.
    pub fn thread_id(&self) -> Result<&str> {
        let decorated = self
            .0
            .get("~thread")
            .and_then(|thread| thread.get("thid"))
            .and_then(Json::as_str)
            .or_else(|| self.str_field("thid"))
            .filter(|thid| !thid.is_empty());
        match decorated.or_else(|| self.id().filter(|id| !id.is_empty())) {
            Some(thid) => Ok(thid),
            None => bail!("message carries neither a thread id nor a message id"),
        }
    }

    /// The out-of-band invitation this message answers, if any.
    ///
    /// `invitationID` is checked first, then `pthid`, then `~thread.pthid`. Only string
    /// values count.
    pub fn invitation_id(&self) -> Option<&str> {
        if let Some(value) = self.0.get("invitationID") {
            return value.as_str();
        }
        self.str_field("pthid").or_else(|| {
            self.0
                .get("~thread")
                .and_then(|thread| thread.get("pthid"))
                .and_then(Json::as_str)
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Json::Object(self.0.clone())).context("failed to decode message")
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Json::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "mime-type")]
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub data: AttachmentData,
}

impl Attachment {
    /// A JSON attachment with a fresh id.
    pub fn json(media_type: &str, format: Option<&str>, json: Json) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            media_type: media_type.to_owned(),
            format: format.map(ToOwned::to_owned),
            data: AttachmentData {
                json: Some(json),
                base64: None,
            },
        }
    }
}

/// Declares the format of the attachment with id `attach_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Format {
    pub attach_id: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebRedirect {
    pub status: String,
    pub url: String,
}

impl WebRedirect {
    pub fn ok(url: impl Into<String>) -> Self {
        Self {
            status: "OK".into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPresentation {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub will_confirm: bool,
    #[serde(rename = "request_presentations~attach")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferCredential {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub formats: Vec<Format>,
    #[serde(rename = "offers~attach")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCredential {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub formats: Vec<Format>,
    #[serde(rename = "credentials~attach")]
    pub attachments: Vec<Attachment>,
    #[serde(rename = "~web-redirect")]
    pub web_redirect: WebRedirect,
}

/// Properties attached to the acknowledgement of a received presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationAck {
    #[serde(rename = "~web-redirect")]
    pub web_redirect: WebRedirect,
}

/// What the protocol service should do next with an accepted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Continuation {
    /// Continue with the protocol's default next step.
    Accept,
    RequestPresentation(RequestPresentation),
    AcknowledgePresentation(PresentationAck),
    OfferCredential(OfferCredential),
    IssueCredential(IssueCredential),
}
