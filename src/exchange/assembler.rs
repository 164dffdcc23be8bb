use serde_json::{json, Value as Json};
use tracing::debug;
use uuid::Uuid;

use super::Error;
use crate::{
    core::{
        credential::{Credential, Presentation},
        credential_manifest::CredentialManifest,
        message::{
            Attachment, Format, IssueCredential, OfferCredential, RequestPresentation,
            WebRedirect, CREDENTIAL_MANIFEST_FORMAT, CREDENTIAL_RESPONSE_FORMAT,
            ISSUE_CREDENTIAL_V2, OFFER_CREDENTIAL_V2, REQUEST_PRESENTATION_V2,
        },
        presentation_definition::PresentationDefinition,
    },
    signer::DocumentSigner,
};

pub const CREDENTIAL_RESPONSE_CONTEXT: &str =
    "https://identity.foundation/credential-manifest/response/v1";
pub const CREDENTIAL_RESPONSE_TYPE: &str = "CredentialResponse";
pub const DEFAULT_CREDENTIAL_ID_PLACEHOLDER: &str = "{{credential_id}}";

/// A token in issued documents that stands for the id of the credential being issued.
///
/// Every occurrence inside a JSON string is replaced by the same freshly minted
/// `urn:uuid:` id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialIdTemplate {
    placeholder: String,
}

impl Default for CredentialIdTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_CREDENTIAL_ID_PLACEHOLDER)
    }
}

impl CredentialIdTemplate {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Replace the placeholder in `document`, returning the assigned id if there was one.
    pub fn assign(&self, document: &mut Json) -> Option<String> {
        self.assign_all([document])
    }

    /// Replace the placeholder in all of `documents` with one shared id.
    pub fn assign_all<'a>(
        &self,
        documents: impl IntoIterator<Item = &'a mut Json>,
    ) -> Option<String> {
        if self.placeholder.is_empty() {
            return None;
        }
        let id = format!("urn:uuid:{}", Uuid::new_v4());
        documents
            .into_iter()
            .fold(false, |found, document| self.replace(document, &id) || found)
            .then_some(id)
    }

    fn replace(&self, value: &mut Json, id: &str) -> bool {
        match value {
            Json::String(s) if s.contains(&self.placeholder) => {
                *s = s.replace(&self.placeholder, id);
                true
            }
            Json::Array(values) => values
                .iter_mut()
                .fold(false, |found, value| self.replace(value, id) || found),
            Json::Object(map) => map
                .values_mut()
                .fold(false, |found, value| self.replace(value, id) || found),
            _ => false,
        }
    }
}

/// Builds the payloads of the outbound protocol messages.
#[derive(Debug, Clone)]
pub struct Assembler {
    signer: DocumentSigner,
    credential_id: CredentialIdTemplate,
}

impl Assembler {
    pub fn new(signer: DocumentSigner) -> Self {
        Self {
            signer,
            credential_id: CredentialIdTemplate::default(),
        }
    }

    pub fn with_credential_id_template(mut self, template: CredentialIdTemplate) -> Self {
        self.credential_id = template;
        self
    }

    pub fn signer(&self) -> &DocumentSigner {
        &self.signer
    }

    pub fn credential_id_template(&self) -> &CredentialIdTemplate {
        &self.credential_id
    }

    /// A request-presentation carrying `definition` with a fresh challenge and domain.
    pub fn build_presentation_request(
        &self,
        definition: &PresentationDefinition,
    ) -> RequestPresentation {
        let options = json!({
            "challenge": Uuid::new_v4().to_string(),
            "domain": Uuid::new_v4().to_string(),
            "presentation_definition": definition,
        });
        RequestPresentation {
            id: Uuid::new_v4().to_string(),
            type_: REQUEST_PRESENTATION_V2.into(),
            comment: Some("Request Presentation".into()),
            will_confirm: true,
            attachments: vec![Attachment::json("application/json", None, options)],
        }
    }

    /// An offer-credential carrying the manifest and the (unsigned) credential response.
    pub fn build_credential_offer(
        &self,
        manifest: &Json,
        response: &Json,
    ) -> Result<OfferCredential, Error> {
        let manifest = CredentialManifest::try_from(manifest.clone())
            .map_err(|e| Error::decode("credential manifest", e))?;
        let response = Presentation::try_from(response.clone())
            .map_err(|e| Error::decode("credential response", e))?;
        debug!("offering '{}'", manifest.display_name());

        let manifest_attachment = Attachment::json(
            "application/json",
            Some(CREDENTIAL_MANIFEST_FORMAT),
            json!({ "credential_manifest": manifest }),
        );
        let response_attachment = Attachment::json(
            "application/json",
            Some(CREDENTIAL_RESPONSE_FORMAT),
            response.into_json(),
        );

        Ok(OfferCredential {
            id: Uuid::new_v4().to_string(),
            type_: OFFER_CREDENTIAL_V2.into(),
            comment: None,
            formats: vec![
                Format {
                    attach_id: manifest_attachment.id.clone(),
                    format: CREDENTIAL_MANIFEST_FORMAT.into(),
                },
                Format {
                    attach_id: response_attachment.id.clone(),
                    format: CREDENTIAL_RESPONSE_FORMAT.into(),
                },
            ],
            attachments: vec![manifest_attachment, response_attachment],
        })
    }

    /// An issue-credential carrying the signed credential response and a web redirect.
    ///
    /// `signed_response` is attached as is.
    pub fn build_credential_issuance(
        &self,
        signed_response: &Json,
        redirect_url: &str,
    ) -> Result<IssueCredential, Error> {
        let response = Presentation::try_from(signed_response.clone())
            .map_err(|e| Error::decode("credential response", e))?;

        let attachment = Attachment::json(
            "application/ld+json",
            Some(CREDENTIAL_RESPONSE_FORMAT),
            response.into_json(),
        );

        Ok(IssueCredential {
            id: Uuid::new_v4().to_string(),
            type_: ISSUE_CREDENTIAL_V2.into(),
            comment: None,
            formats: vec![Format {
                attach_id: attachment.id.clone(),
                format: CREDENTIAL_RESPONSE_FORMAT.into(),
            }],
            attachments: vec![attachment],
            web_redirect: WebRedirect::ok(redirect_url),
        })
    }

    /// The `CredentialResponse` presentation wrapping `credential`.
    ///
    /// The fields of `response` are merged in at the top level. When `sign` is set both the
    /// credential and the presentation get a proof.
    pub async fn build_response_presentation(
        &self,
        response: &Json,
        credential: &Json,
        sign: bool,
    ) -> Result<Presentation, Error> {
        let Json::Object(fields) = response else {
            return Err(Error::Decode(
                "credential response: must be a JSON object".into(),
            ));
        };
        let mut credential = Credential::try_from(credential.clone())
            .map_err(|e| Error::decode("credential", e))?;

        let mut presentation = Presentation::new()
            .add_context(CREDENTIAL_RESPONSE_CONTEXT)
            .add_type(CREDENTIAL_RESPONSE_TYPE)
            .with_custom_fields(fields.clone());

        if sign {
            self.signer.sign_credential(&mut credential).await?;
        }
        presentation.add_credential(credential);
        if sign {
            self.signer.sign_presentation(&mut presentation).await?;
        }
        Ok(presentation)
    }
}
