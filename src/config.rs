use anyhow::{bail, Error};
use serde::Deserialize;
use url::Url;

use crate::exchange::assembler::DEFAULT_CREDENTIAL_ID_PLACEHOLDER;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Where the adapter is reachable from the holder's browser.
    pub external_url: BaseUrl,
    #[serde(default = "default_credential_id_placeholder")]
    pub credential_id_placeholder: String,
    #[serde(default = "default_action_queue_capacity")]
    pub action_queue_capacity: usize,
    #[serde(default)]
    pub invitation_label: Option<String>,
    /// DIDComm service (a DID or an endpoint URL) advertised in invitations.
    #[serde(default)]
    pub invitation_service: Option<String>,
}

impl Config {
    pub fn new(external_url: BaseUrl) -> Self {
        Self {
            external_url,
            credential_id_placeholder: default_credential_id_placeholder(),
            action_queue_capacity: default_action_queue_capacity(),
            invitation_label: None,
            invitation_service: None,
        }
    }
}

fn default_credential_id_placeholder() -> String {
    DEFAULT_CREDENTIAL_ID_PLACEHOLDER.into()
}

fn default_action_queue_capacity() -> usize {
    64
}

/// A url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// This url with `segments` appended to its path, each percent-encoded.
    pub fn with_segments<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.0.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl std::str::FromStr for BaseUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.to_owned().try_into()
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = Error;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        // Make URL a base.
        if !url.ends_with('/') {
            url += "/"
        }
        let url: Url = url.parse()?;
        if url.cannot_be_a_base() {
            bail!("'{url}' cannot be used as a base url")
        }
        Ok(Self(url))
    }
}
