use http::StatusCode;

use crate::core::store::StoreError;

/// Failure of an authorization-code bridge step.
///
/// The display string is what the client receives as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("malformed token")]
    MalformedToken,
    #[error("unsupported grant type")]
    UnsupportedGrantType,
    #[error("unsupported format requested")]
    UnsupportedFormat,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl BridgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::InvalidRequest(_)
            | BridgeError::MalformedToken
            | BridgeError::UnsupportedGrantType
            | BridgeError::UnsupportedFormat => StatusCode::BAD_REQUEST,
            BridgeError::Forbidden(_) => StatusCode::FORBIDDEN,
            BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
            BridgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn storage(context: &str) -> impl FnOnce(StoreError) -> Self + '_ {
        move |e| {
            tracing::error!("{context}: {e}");
            BridgeError::Internal(context.to_owned())
        }
    }
}
