//! `Ed25519Signature2018` linked-data proofs through `ssi` data integrity.
//!
//! Documents are signed and verified on their RDF canonical form, so two JSON renditions of
//! the same JSON-LD dataset carry the same proof. Contexts are resolved offline: `ssi`'s
//! bundled contexts plus the ones in [BUNDLED_CONTEXTS].

use std::collections::HashMap;

use serde_json::Value as Json;
use ssi::{
    claims::{
        data_integrity::DataIntegrity,
        vc::v1::{JsonCredential, JsonPresentation},
        SignatureEnvironment,
    },
    dids::{DIDKey, VerificationMethodDIDResolver},
    json_ld::ContextLoader,
    prelude::*,
    verification_methods::ProofPurpose,
};

use super::{KeyProvider, SignerError};
use crate::core::credential::{Credential, Presentation, ProofDocument};

pub const ED25519_SIGNATURE_2018: &str = "Ed25519Signature2018";

/// Contexts the adapter's own documents use that `ssi` does not ship.
pub const BUNDLED_CONTEXTS: [(&str, &str); 1] = [(
    "https://identity.foundation/credential-manifest/response/v1",
    include_str!("contexts/credential-manifest-response-v1.json"),
)];

fn context_loader() -> Result<ContextLoader, SignerError> {
    let contexts = BUNDLED_CONTEXTS
        .iter()
        .map(|(url, document)| ((*url).to_owned(), (*document).to_owned()))
        .collect::<HashMap<_, _>>();
    ContextLoader::default()
        .with_context_map_from(contexts)
        .map_err(|e| SignerError::Signing(format!("bundled context is invalid: {e}")))
}

fn resolver() -> VerificationMethodDIDResolver<DIDKey, AnyMethod> {
    VerificationMethodDIDResolver::new(DIDKey)
}

fn environment() -> Result<SignatureEnvironment, SignerError> {
    Ok(SignatureEnvironment {
        json_ld_loader: context_loader()?,
        eip712_loader: (),
    })
}

/// Proofs `credential` would carry if signed now with an `assertionMethod` proof.
pub(crate) async fn prove_credential(
    provider: &dyn KeyProvider,
    credential: &Credential,
) -> Result<Vec<Json>, SignerError> {
    let unsecured: JsonCredential = serde_json::from_value(Json::Object(credential.unsecured()))
        .map_err(|e| SignerError::MalformedDocument(e.to_string()))?;

    let resolver = resolver();
    let signer = SingleSecretSigner::new(provider.jwk().clone()).into_local();
    let options = ProofOptions::from_method(provider.did_url().clone().into_iri().into());

    let secured = AnySuite::Ed25519Signature2018
        .sign_with(
            environment()?,
            unsecured,
            &resolver,
            &signer,
            options,
            Default::default(),
        )
        .await
        .map_err(|e| SignerError::Signing(e.to_string()))?;
    proofs_of(serde_json::to_value(&secured)?)
}

/// Proofs `presentation` would carry if signed now with an `authentication` proof.
pub(crate) async fn prove_presentation(
    provider: &dyn KeyProvider,
    presentation: &Presentation,
) -> Result<Vec<Json>, SignerError> {
    let unsecured: JsonPresentation =
        serde_json::from_value(Json::Object(presentation.unsecured()))
            .map_err(|e| SignerError::MalformedDocument(e.to_string()))?;

    let resolver = resolver();
    let signer = SingleSecretSigner::new(provider.jwk().clone()).into_local();
    let mut options = ProofOptions::from_method(provider.did_url().clone().into_iri().into());
    options.proof_purpose = ProofPurpose::Authentication;

    let secured = AnySuite::Ed25519Signature2018
        .sign_with(
            environment()?,
            unsecured,
            &resolver,
            &signer,
            options,
            Default::default(),
        )
        .await
        .map_err(|e| SignerError::Signing(e.to_string()))?;
    proofs_of(serde_json::to_value(&secured)?)
}

fn proofs_of(secured: Json) -> Result<Vec<Json>, SignerError> {
    match secured.get("proof") {
        Some(Json::Array(proofs)) if !proofs.is_empty() => Ok(proofs.clone()),
        Some(proof @ Json::Object(_)) => Ok(vec![proof.clone()]),
        _ => Err(SignerError::Signing("no proof was produced".into())),
    }
}

/// Verify every proof embedded in `credential`.
pub(crate) async fn verify_credential(credential: &Credential) -> Result<(), SignerError> {
    let secured: DataIntegrity<JsonCredential, AnySuite> =
        serde_json::from_value(Json::Object(credential.as_object().clone()))
            .map_err(|e| SignerError::MalformedProof(e.to_string()))?;
    let params =
        VerificationParameters::from_resolver(resolver()).with_json_ld_loader(context_loader()?);

    match secured.verify(&params).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(invalid)) => Err(SignerError::InvalidSignature(invalid.to_string())),
        Err(e) => Err(SignerError::InvalidSignature(e.to_string())),
    }
}

/// Verify every proof embedded in `presentation`. Embedded credentials are not checked.
pub(crate) async fn verify_presentation(presentation: &Presentation) -> Result<(), SignerError> {
    let secured: DataIntegrity<JsonPresentation, AnySuite> =
        serde_json::from_value(Json::Object(presentation.as_object().clone()))
            .map_err(|e| SignerError::MalformedProof(e.to_string()))?;
    let params =
        VerificationParameters::from_resolver(resolver()).with_json_ld_loader(context_loader()?);

    match secured.verify(&params).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(invalid)) => Err(SignerError::InvalidSignature(invalid.to_string())),
        Err(e) => Err(SignerError::InvalidSignature(e.to_string())),
    }
}
