//! W3C Verifiable Credential and Presentation documents.
//!
//! Both are held as JSON-LD objects so that every field the issuer put in a credential
//! survives parsing, proof embedding and re-serialization. Parsing checks the structural
//! requirements of the [VC Data Model v1.1](https://www.w3.org/TR/vc-data-model/) that the
//! exchange depends on; it never verifies proofs.

use anyhow::{bail, Context, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

pub const CREDENTIALS_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const VERIFIABLE_CREDENTIAL_TYPE: &str = "VerifiableCredential";
pub const VERIFIABLE_PRESENTATION_TYPE: &str = "VerifiablePresentation";

/// Top level presentation properties that custom fields can never replace.
const RESERVED_PRESENTATION_FIELDS: [&str; 6] = [
    "@context",
    "id",
    "type",
    "holder",
    "verifiableCredential",
    "proof",
];

/// An embedded linked-data proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(rename = "type")]
    pub type_: String,
    pub created: DateTime<Utc>,
    pub verification_method: String,
    pub proof_purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jws: Option<String>,
}

/// A JSON-LD document that can carry embedded proofs.
pub trait ProofDocument {
    fn as_object(&self) -> &Map<String, Json>;

    fn as_object_mut(&mut self) -> &mut Map<String, Json>;

    /// The document without any `proof`, i.e. what a proof is computed over.
    fn unsecured(&self) -> Map<String, Json> {
        let mut document = self.as_object().clone();
        document.remove("proof");
        document
    }

    /// Embedded proofs, whether `proof` holds a single object or an array.
    fn proofs(&self) -> Result<Vec<Proof>> {
        match self.as_object().get("proof") {
            None => Ok(Vec::new()),
            Some(Json::Array(proofs)) => proofs
                .iter()
                .map(|proof| serde_json::from_value(proof.clone()).context("malformed proof"))
                .collect(),
            Some(proof) => Ok(vec![
                serde_json::from_value(proof.clone()).context("malformed proof")?
            ]),
        }
    }

    /// Embed `proof`, turning an existing single proof into a proof set.
    ///
    /// The proof is kept as given so fields [Proof] does not model survive.
    fn add_proof(&mut self, proof: Json) -> Result<()> {
        if !proof.is_object() {
            bail!("proof must be a JSON object")
        }
        let document = self.as_object_mut();
        match document.remove("proof") {
            None => {
                document.insert("proof".into(), proof);
            }
            Some(Json::Array(mut proofs)) => {
                proofs.push(proof);
                document.insert("proof".into(), Json::Array(proofs));
            }
            Some(existing) => {
                document.insert("proof".into(), Json::Array(vec![existing, proof]));
            }
        }
        Ok(())
    }
}

/// A verifiable credential.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Json", into = "Json")]
pub struct Credential(Map<String, Json>);

impl Credential {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Json = serde_json::from_slice(bytes).context("credential is not valid JSON")?;
        value.try_into()
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Json::as_str)
    }

    pub fn types(&self) -> Vec<&str> {
        string_or_array(self.0.get("type"))
    }

    /// The issuer id, whether `issuer` is a URI or an object with an `id`.
    pub fn issuer(&self) -> Option<&str> {
        match self.0.get("issuer")? {
            Json::String(issuer) => Some(issuer),
            Json::Object(issuer) => issuer.get("id").and_then(Json::as_str),
            _ => None,
        }
    }

    /// The id of the (first) credential subject.
    pub fn subject_id(&self) -> Option<&str> {
        match self.0.get("credentialSubject")? {
            Json::Array(subjects) => subjects.first()?.get("id").and_then(Json::as_str),
            subject => subject.get("id").and_then(Json::as_str),
        }
    }

    pub fn issuance_date(&self) -> Option<DateTime<Utc>> {
        parse_date(self.0.get("issuanceDate"))
    }

    pub fn expiration_date(&self) -> Option<DateTime<Utc>> {
        parse_date(self.0.get("expirationDate"))
    }

    pub fn into_json(self) -> Json {
        self.into()
    }
}

impl ProofDocument for Credential {
    fn as_object(&self) -> &Map<String, Json> {
        &self.0
    }

    fn as_object_mut(&mut self) -> &mut Map<String, Json> {
        &mut self.0
    }
}

impl TryFrom<Json> for Credential {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self> {
        let Json::Object(map) = value else {
            bail!("credential must be a JSON object")
        };
        check_context(&map)?;
        if !string_or_array(map.get("type")).contains(&VERIFIABLE_CREDENTIAL_TYPE) {
            bail!("credential 'type' must include '{VERIFIABLE_CREDENTIAL_TYPE}'")
        }
        let credential = Self(map);
        if credential.issuer().is_none() {
            bail!("credential is missing its 'issuer'")
        }
        if !credential.0.contains_key("credentialSubject") {
            bail!("credential is missing its 'credentialSubject'")
        }
        if credential.0.contains_key("issuanceDate") && credential.issuance_date().is_none() {
            bail!("credential 'issuanceDate' is not an RFC 3339 timestamp")
        }
        Ok(credential)
    }
}

impl From<Credential> for Json {
    fn from(value: Credential) -> Self {
        Json::Object(value.0)
    }
}

/// A verifiable presentation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Json", into = "Json")]
pub struct Presentation(Map<String, Json>);

impl Default for Presentation {
    fn default() -> Self {
        Self::new()
    }
}

impl Presentation {
    /// An empty presentation with the base context and type.
    pub fn new() -> Self {
        let mut map = Map::new();
        map.insert(
            "@context".into(),
            Json::Array(vec![CREDENTIALS_V1_CONTEXT.into()]),
        );
        map.insert(
            "type".into(),
            Json::Array(vec![VERIFIABLE_PRESENTATION_TYPE.into()]),
        );
        Self(map)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Json =
            serde_json::from_slice(bytes).context("presentation is not valid JSON")?;
        value.try_into()
    }

    pub fn add_context(mut self, context: &str) -> Self {
        push_to_array(&mut self.0, "@context", context.into());
        self
    }

    pub fn add_type(mut self, type_: &str) -> Self {
        push_to_array(&mut self.0, "type", type_.into());
        self
    }

    pub fn types(&self) -> Vec<&str> {
        string_or_array(self.0.get("type"))
    }

    /// Merge free-form top level fields into the presentation.
    ///
    /// Fields already present, and the reserved presentation properties, are left alone.
    pub fn with_custom_fields(mut self, fields: Map<String, Json>) -> Self {
        for (key, value) in fields {
            if RESERVED_PRESENTATION_FIELDS.contains(&key.as_str()) || self.0.contains_key(&key)
            {
                continue;
            }
            self.0.insert(key, value);
        }
        self
    }

    pub fn add_credential(&mut self, credential: Credential) {
        push_to_array(&mut self.0, "verifiableCredential", credential.into());
    }

    pub fn credentials(&self) -> Result<Vec<Credential>> {
        match self.0.get("verifiableCredential") {
            None => Ok(Vec::new()),
            Some(Json::Array(credentials)) => credentials
                .iter()
                .cloned()
                .map(Credential::try_from)
                .collect(),
            Some(credential) => Ok(vec![credential.clone().try_into()?]),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Json> {
        self.0.get(field)
    }

    pub fn into_json(self) -> Json {
        self.into()
    }
}

impl ProofDocument for Presentation {
    fn as_object(&self) -> &Map<String, Json> {
        &self.0
    }

    fn as_object_mut(&mut self) -> &mut Map<String, Json> {
        &mut self.0
    }
}

impl TryFrom<Json> for Presentation {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self> {
        let Json::Object(map) = value else {
            bail!("presentation must be a JSON object")
        };
        check_context(&map)?;
        if !string_or_array(map.get("type")).contains(&VERIFIABLE_PRESENTATION_TYPE) {
            bail!("presentation 'type' must include '{VERIFIABLE_PRESENTATION_TYPE}'")
        }
        let presentation = Self(map);
        presentation
            .credentials()
            .context("presentation carries an invalid credential")?;
        Ok(presentation)
    }
}

impl From<Presentation> for Json {
    fn from(value: Presentation) -> Self {
        Json::Object(value.0)
    }
}

fn check_context(map: &Map<String, Json>) -> Result<()> {
    let first = match map.get("@context") {
        Some(Json::String(context)) => Some(context.as_str()),
        Some(Json::Array(contexts)) => contexts.first().and_then(Json::as_str),
        _ => bail!("document is missing its '@context'"),
    };
    if first != Some(CREDENTIALS_V1_CONTEXT) {
        bail!("the first '@context' entry must be '{CREDENTIALS_V1_CONTEXT}'")
    }
    Ok(())
}

fn string_or_array(value: Option<&Json>) -> Vec<&str> {
    match value {
        Some(Json::String(s)) => vec![s.as_str()],
        Some(Json::Array(values)) => values.iter().filter_map(Json::as_str).collect(),
        _ => Vec::new(),
    }
}

fn push_to_array(map: &mut Map<String, Json>, key: &str, value: Json) {
    match map.remove(key) {
        None => {
            map.insert(key.into(), Json::Array(vec![value]));
        }
        Some(Json::Array(mut values)) => {
            values.push(value);
            map.insert(key.into(), Json::Array(values));
        }
        Some(existing) => {
            map.insert(key.into(), Json::Array(vec![existing, value]));
        }
    }
}

fn parse_date(value: Option<&Json>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value?.as_str()?)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
