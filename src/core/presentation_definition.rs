use anyhow::{bail, Context, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// A presentation definition is a JSON object that describes the information a
/// [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier)
/// requires of a [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder).
///
/// The adapter never evaluates the constraints itself, that is the job of the holder's wallet.
/// The document is therefore kept as-is, and only the two properties every definition MUST
/// carry are checked: `id` (a string) and `input_descriptors` (an array).
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Json", into = "Json")]
pub struct PresentationDefinition(Map<String, Json>);

impl PresentationDefinition {
    /// Parse a presentation definition from its JSON encoding.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Json =
            serde_json::from_slice(bytes).context("presentation definition is not valid JSON")?;
        value.try_into()
    }

    /// Return the id of the presentation definition.
    pub fn id(&self) -> &str {
        self.0
            .get("id")
            .and_then(Json::as_str)
            .unwrap_or_default()
    }
}

impl TryFrom<Json> for PresentationDefinition {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self> {
        let Json::Object(map) = value else {
            bail!("presentation definition must be a JSON object")
        };
        if !map.get("id").is_some_and(Json::is_string) {
            bail!("presentation definition is missing a string 'id'")
        }
        if !map.get("input_descriptors").is_some_and(Json::is_array) {
            bail!("presentation definition is missing the 'input_descriptors' array")
        }
        Ok(Self(map))
    }
}

impl From<PresentationDefinition> for Json {
    fn from(value: PresentationDefinition) -> Self {
        Json::Object(value.0)
    }
}
