//! Signing of credentials, presentations and JWTs with the adapter's single identity.

use std::{fmt::Debug, sync::Arc};

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::Serialize;
use serde_json::Value as Json;
use ssi::{
    dids::{DIDKey, DIDURLBuf},
    jwk::{Algorithm, Base64urlUInt, OctetParams, Params, JWK},
};

use crate::core::credential::{Credential, Presentation, ProofDocument};

pub mod jwt;
pub mod ldp;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("malformed signing key: {0}")]
    MalformedKey(String),
    #[error("document cannot be signed: {0}")]
    MalformedDocument(String),
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    #[error("signature could not be verified: {0}")]
    InvalidSignature(String),
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to sign: {0}")]
    Signing(String),
}

/// Holds the signing identity.
pub trait KeyProvider: Debug + Send + Sync {
    /// The private key, with `kid` set to [KeyProvider::verification_method].
    fn jwk(&self) -> &JWK;
    /// The `did:key` URL a verifier resolves to find the public key.
    fn did_url(&self) -> &DIDURLBuf;

    fn verification_method(&self) -> &str {
        self.did_url().as_str()
    }
}

/// An in-process Ed25519 key identified by its `did:key`.
#[derive(Debug)]
pub struct Ed25519Signer {
    jwk: JWK,
    did_url: DIDURLBuf,
}

impl Ed25519Signer {
    pub fn new(key: SigningKey) -> Result<Self, SignerError> {
        let mut jwk = JWK::from(Params::OKP(OctetParams {
            curve: "Ed25519".to_owned(),
            public_key: Base64urlUInt(key.verifying_key().to_bytes().to_vec()),
            private_key: Some(Base64urlUInt(key.to_bytes().to_vec())),
        }));
        let did_url = DIDKey::generate_url(&jwk.to_public())
            .map_err(|e| SignerError::MalformedKey(e.to_string()))?;
        jwk.algorithm = Some(Algorithm::EdDSA);
        jwk.key_id = Some(did_url.as_str().to_owned());
        Ok(Self { jwk, did_url })
    }

    /// A fresh random key.
    pub fn generate() -> Result<Self, SignerError> {
        Self::new(SigningKey::generate(&mut OsRng))
    }

    /// Build a signer from a 32 byte seed or a 64 byte `seed || public key` pair.
    pub fn from_secret(secret: &[u8]) -> Result<Self, SignerError> {
        let key = match secret.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(secret);
                SigningKey::from_bytes(&seed)
            }
            64 => {
                let mut pair = [0u8; 64];
                pair.copy_from_slice(secret);
                SigningKey::from_keypair_bytes(&pair)
                    .map_err(|e| SignerError::MalformedKey(e.to_string()))?
            }
            len => {
                return Err(SignerError::MalformedKey(format!(
                    "expected 32 or 64 bytes, found {len}"
                )))
            }
        };
        Self::new(key)
    }

    /// Build a signer from a multibase encoded secret, e.g. `z3u2en7t5LR2WtQH5PfsqMWUGCbgNgmm...`.
    pub fn from_multibase(secret: &str) -> Result<Self, SignerError> {
        let (_, bytes) = multibase::decode(secret.trim())
            .map_err(|e| SignerError::MalformedKey(e.to_string()))?;
        Self::from_secret(&bytes)
    }
}

impl KeyProvider for Ed25519Signer {
    fn jwk(&self) -> &JWK {
        &self.jwk
    }

    fn did_url(&self) -> &DIDURLBuf {
        &self.did_url
    }
}

/// Signs documents on behalf of the adapter and checks that documents were signed by it.
#[derive(Debug, Clone)]
pub struct DocumentSigner {
    provider: Arc<dyn KeyProvider>,
}

impl DocumentSigner {
    pub fn new(provider: Arc<dyn KeyProvider>) -> Self {
        Self { provider }
    }

    pub fn verification_method(&self) -> &str {
        self.provider.verification_method()
    }

    /// The DID behind [DocumentSigner::verification_method].
    pub fn did(&self) -> &str {
        let method = self.verification_method();
        method.split_once('#').map_or(method, |(did, _)| did)
    }

    /// Embed an `assertionMethod` proof in `credential`.
    pub async fn sign_credential(&self, credential: &mut Credential) -> Result<(), SignerError> {
        for proof in ldp::prove_credential(self.provider.as_ref(), credential).await? {
            credential
                .add_proof(proof)
                .map_err(|e| SignerError::MalformedProof(e.to_string()))?;
        }
        Ok(())
    }

    /// Embed an `authentication` proof in `presentation`.
    pub async fn sign_presentation(
        &self,
        presentation: &mut Presentation,
    ) -> Result<(), SignerError> {
        for proof in ldp::prove_presentation(self.provider.as_ref(), presentation).await? {
            presentation
                .add_proof(proof)
                .map_err(|e| SignerError::MalformedProof(e.to_string()))?;
        }
        Ok(())
    }

    /// Sign `claims` as a compact JWT.
    pub async fn sign_jwt<T>(&self, claims: &T) -> Result<String, SignerError>
    where
        T: Serialize + Sync,
    {
        jwt::encode(self.provider.as_ref(), claims)
    }

    /// Sign `credential` as a VC-JWT.
    pub async fn sign_credential_jwt(&self, credential: &Credential) -> Result<String, SignerError> {
        self.sign_jwt(&jwt::CredentialClaims::from_credential(credential))
            .await
    }

    /// Verify that every embedded proof of `credential` holds and was made by this signer.
    pub async fn verify_credential(&self, credential: &Credential) -> Result<(), SignerError> {
        self.check_proof_authors(credential)?;
        ldp::verify_credential(credential).await
    }

    /// Verify that every embedded proof of `presentation` holds and was made by this signer.
    pub async fn verify_presentation(
        &self,
        presentation: &Presentation,
    ) -> Result<(), SignerError> {
        self.check_proof_authors(presentation)?;
        ldp::verify_presentation(presentation).await
    }

    fn check_proof_authors(&self, document: &impl ProofDocument) -> Result<(), SignerError> {
        let proofs = document
            .proofs()
            .map_err(|e| SignerError::MalformedProof(e.to_string()))?;
        if proofs.is_empty() {
            return Err(SignerError::MalformedProof(
                "document carries no proof".into(),
            ));
        }
        match proofs
            .iter()
            .find(|proof| proof.verification_method != self.verification_method())
        {
            Some(proof) => Err(SignerError::InvalidSignature(format!(
                "proof was made by '{}'",
                proof.verification_method
            ))),
            None => Ok(()),
        }
    }

    /// Verify a compact JWT against this signer's public key and return its claims.
    pub fn verify_jwt(&self, token: &str) -> Result<Json, SignerError> {
        jwt::verify(&self.provider.jwk().to_public(), token)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn credential() -> Credential {
        serde_json::from_value(json!({
            "@context": [
                "https://www.w3.org/2018/credentials/v1",
                "https://www.w3.org/2018/credentials/examples/v1"
            ],
            "id": "urn:uuid:3978344f-8596-4c3a-a978-8fcaba3903c5",
            "type": ["VerifiableCredential", "UniversityDegreeCredential"],
            "issuer": "did:example:28394728934792387",
            "issuanceDate": "2019-12-03T12:19:52Z",
            "credentialSubject": {
                "id": "did:example:b34ca6cd37bbf23",
                "degree": {"type": "BachelorDegree", "name": "Bachelor of Science and Arts"}
            }
        }))
        .unwrap()
    }

    fn signer() -> DocumentSigner {
        DocumentSigner::new(Arc::new(Ed25519Signer::generate().unwrap()))
    }

    #[test]
    fn verification_method_is_did_key() {
        let signer = Ed25519Signer::from_secret(&[7u8; 32]).unwrap();
        let method = signer.verification_method().to_owned();
        let method = method.as_str();
        let (did, fragment) = method.split_once('#').unwrap();

        assert!(did.starts_with("did:key:z6Mk"));
        assert_eq!(did.trim_start_matches("did:key:"), fragment);
        assert_eq!(Some(method), signer.jwk().key_id.as_deref());
        assert_eq!(did, DocumentSigner::new(Arc::new(signer)).did());
    }

    #[test]
    fn malformed_key_material() {
        let err = Ed25519Signer::from_secret(&[1u8; 31]).unwrap_err();
        assert!(matches!(err, SignerError::MalformedKey(_)));

        let err = Ed25519Signer::from_multibase("not multibase").unwrap_err();
        assert!(matches!(err, SignerError::MalformedKey(_)));
    }

    #[test]
    fn keypair_bytes_must_match() {
        let key = SigningKey::from_bytes(&[9u8; 32]);
        let pair = key.to_keypair_bytes();
        assert!(Ed25519Signer::from_secret(&pair).is_ok());

        let mut mismatched = pair;
        mismatched[40] ^= 0xff;
        assert!(Ed25519Signer::from_secret(&mismatched).is_err());
    }

    #[tokio::test]
    async fn signed_credential_verifies() {
        let signer = signer();
        let mut credential = credential();
        signer.sign_credential(&mut credential).await.unwrap();

        let proofs = credential.proofs().unwrap();
        assert_eq!(1, proofs.len());
        assert_eq!(ldp::ED25519_SIGNATURE_2018, proofs[0].type_);
        assert_eq!("assertionMethod", proofs[0].proof_purpose);
        assert_eq!(signer.verification_method(), proofs[0].verification_method);

        signer.verify_credential(&credential).await.unwrap();
    }

    #[tokio::test]
    async fn tampered_credential_fails_verification() {
        let signer = signer();
        let mut credential = credential();
        signer.sign_credential(&mut credential).await.unwrap();

        let mut value = credential.into_json();
        value["credentialSubject"]["degree"]["name"] = json!("Master of Arts");
        let tampered: Credential = serde_json::from_value(value).unwrap();

        let err = signer.verify_credential(&tampered).await.unwrap_err();
        assert!(matches!(err, SignerError::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn other_key_fails_verification() {
        let mut credential = credential();
        signer().sign_credential(&mut credential).await.unwrap();

        let err = signer().verify_credential(&credential).await.unwrap_err();
        assert!(matches!(err, SignerError::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn presentation_proof_is_for_authentication() {
        let signer = signer();
        let mut presentation = Presentation::new();
        presentation.add_credential(credential());
        signer.sign_presentation(&mut presentation).await.unwrap();

        assert_eq!(
            "authentication",
            presentation.proofs().unwrap()[0].proof_purpose
        );
        signer.verify_presentation(&presentation).await.unwrap();
    }

    #[tokio::test]
    async fn second_signature_keeps_first_valid() {
        let signer = signer();
        let mut credential = credential();
        signer.sign_credential(&mut credential).await.unwrap();
        signer.sign_credential(&mut credential).await.unwrap();

        assert_eq!(2, credential.proofs().unwrap().len());
        signer.verify_credential(&credential).await.unwrap();
    }

    #[tokio::test]
    async fn credential_jwt_verifies() {
        let signer = signer();
        let token = signer.sign_credential_jwt(&credential()).await.unwrap();

        let claims = signer.verify_jwt(&token).unwrap();
        assert_eq!(json!("did:example:28394728934792387"), claims["iss"]);
        assert_eq!(json!("did:example:b34ca6cd37bbf23"), claims["sub"]);
        assert_eq!(
            json!("urn:uuid:3978344f-8596-4c3a-a978-8fcaba3903c5"),
            claims["jti"]
        );
        assert_eq!(json!("UniversityDegreeCredential"), claims["vc"]["type"][1]);
    }
}
