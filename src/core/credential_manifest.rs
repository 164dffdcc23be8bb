use anyhow::{bail, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// A [Credential Manifest](https://identity.foundation/credential-manifest/) describes what
/// credential an issuer can offer and how to request it.
///
/// Like [PresentationDefinition](super::presentation_definition::PresentationDefinition) it is
/// kept opaque: only `id` and `output_descriptors` are required.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Json", into = "Json")]
pub struct CredentialManifest(Map<String, Json>);

impl CredentialManifest {
    pub fn output_descriptors(&self) -> &[Json] {
        self.0
            .get("output_descriptors")
            .and_then(Json::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// A human readable label for the credential on offer.
    ///
    /// Falls back from the manifest `name` to the first output descriptor's name and finally
    /// to the manifest id.
    pub fn display_name(&self) -> &str {
        self.0
            .get("name")
            .and_then(Json::as_str)
            .or_else(|| {
                self.output_descriptors()
                    .first()
                    .and_then(|descriptor| descriptor.get("name"))
                    .and_then(Json::as_str)
            })
            .or_else(|| self.0.get("id").and_then(Json::as_str))
            .unwrap_or_default()
    }
}

impl TryFrom<Json> for CredentialManifest {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self> {
        let Json::Object(map) = value else {
            bail!("credential manifest must be a JSON object")
        };
        if !map.get("id").is_some_and(Json::is_string) {
            bail!("credential manifest is missing a string 'id'")
        }
        if !map.get("output_descriptors").is_some_and(Json::is_array) {
            bail!("credential manifest is missing the 'output_descriptors' array")
        }
        Ok(Self(map))
    }
}

impl From<CredentialManifest> for Json {
    fn from(value: CredentialManifest) -> Self {
        Json::Object(value.0)
    }
}
