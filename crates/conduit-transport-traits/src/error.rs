//! Transport-level error type, with conversions to and from the crate-wide
//! [`conduit_core::Error`] so transports can surface failures through the
//! same JSON-RPC error envelope as everything else.

use std::time::Duration;
use thiserror::Error;

use conduit_core::ErrorKind;

use crate::config::LimitsConfig;

/// A specialized `Result` for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("operation timed out")]
    Timeout,

    #[error("connect timed out after {timeout:?} for {operation}")]
    ConnectTimeout { operation: String, timeout: Duration },

    #[error("request timed out after {timeout:?} for {operation}")]
    RequestTimeout { operation: String, timeout: Duration },

    #[error("read timed out after {timeout:?} for {operation}")]
    ReadTimeout { operation: String, timeout: Duration },

    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("session expired: {0}")]
    SessionExpired(String),

    #[error("request {0} was cancelled")]
    Cancelled(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("request size ({size} bytes) exceeds maximum allowed ({max} bytes)")]
    RequestTooLarge { size: usize, max: usize },

    #[error("response size ({size} bytes) exceeds maximum allowed ({max} bytes)")]
    ResponseTooLarge { size: usize, max: usize },
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailed(err.to_string())
    }
}

impl From<TransportError> for conduit_core::Error {
    fn from(err: TransportError) -> Self {
        let kind = match &err {
            TransportError::Timeout
            | TransportError::ConnectTimeout { .. }
            | TransportError::RequestTimeout { .. }
            | TransportError::ReadTimeout { .. } => ErrorKind::RequestTimeout,
            TransportError::ConnectionFailed(_) | TransportError::ConnectionLost(_) => {
                ErrorKind::ConnectionClosed
            }
            TransportError::SessionExpired(_) => ErrorKind::SessionExpired,
            TransportError::Cancelled(_) => ErrorKind::RequestCancelled,
            TransportError::SendFailed(_)
            | TransportError::ReceiveFailed(_)
            | TransportError::Io(_) => ErrorKind::TransportError,
            TransportError::SerializationFailed(_) => ErrorKind::ParseError,
            TransportError::ProtocolError(_) => ErrorKind::InvalidRequest,
            TransportError::ConfigurationError(_) => ErrorKind::InvalidParams,
            TransportError::AuthenticationFailed(_) => ErrorKind::InternalError,
            TransportError::RequestTooLarge { .. } => ErrorKind::InvalidParams,
            TransportError::ResponseTooLarge { .. } | TransportError::Internal(_) => {
                ErrorKind::InternalError
            }
        };
        conduit_core::Error::new(kind, err.to_string())
            .with_component("transport")
    }
}

/// Rejects a request body over `limits.max_request_size`.
pub fn validate_request_size(size: usize, limits: &LimitsConfig) -> TransportResult<()> {
    if let Some(max) = limits.max_request_size {
        if size > max {
            return Err(TransportError::RequestTooLarge { size, max });
        }
    }
    Ok(())
}

/// Rejects a response body over `limits.max_response_size`.
pub fn validate_response_size(size: usize, limits: &LimitsConfig) -> TransportResult<()> {
    if let Some(max) = limits.max_response_size {
        if size > max {
            return Err(TransportError::ResponseTooLarge { size, max });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_size_validation_rejects_oversized_bodies() {
        let limits = LimitsConfig::default();
        assert!(validate_request_size(1000, &limits).is_ok());
        assert!(validate_request_size(10 * 1024 * 1024, &limits).is_err());
    }

    #[test]
    fn unlimited_config_accepts_anything() {
        let limits = LimitsConfig::unlimited();
        assert!(validate_response_size(100 * 1024 * 1024, &limits).is_ok());
    }

    #[test]
    fn session_expired_maps_to_session_expired_kind() {
        let err: conduit_core::Error = TransportError::SessionExpired("s1".into()).into();
        assert_eq!(err.kind(), ErrorKind::SessionExpired);
    }
}
