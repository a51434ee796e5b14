use thiserror::Error;

/// Errors raised while encoding or decoding a [`crate::Value`].
#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("malformed data-URL binary payload: {0}")]
    InvalidDataUrl(String),

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("number {0} cannot be represented as a wire value")]
    UnrepresentableNumber(String),
}
