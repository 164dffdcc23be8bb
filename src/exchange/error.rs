use crate::{core::store::StoreError, signer::SignerError};

/// Failure while assembling or correlating an exchange.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A correlated record or document is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored or received document could not be decoded.
    #[error("failed to decode {0}")]
    Decode(String),

    /// A document decoded but is missing something the exchange needs.
    #[error("invalid exchange data: {0}")]
    Validation(String),

    #[error("signing failed: {0}")]
    Signing(#[from] SignerError),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl Error {
    /// Wrap a decoding failure, keeping the full context chain.
    pub fn decode(what: &str, e: anyhow::Error) -> Self {
        Self::Decode(format!("{what}: {e:#}"))
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => Self::NotFound(key),
            StoreError::Decode { .. } => Self::Decode(e.to_string()),
            e => Self::Storage(e.to_string()),
        }
    }
}
