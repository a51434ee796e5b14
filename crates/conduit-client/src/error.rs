//! The client-role error type: maps dispatch, capability-gating, and
//! transport failures onto the shared [`conduit_core::ErrorKind`] taxonomy,
//! mirroring `conduit-server`'s error taxonomy for the opposite role.

use conduit_core::{Error as CoreError, ErrorKind};
use conduit_transport_traits::error::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("server does not advertise the '{0}' capability")]
    CapabilityNotSupported(String),

    #[error("request must complete the initialize handshake first")]
    NotInitialized,

    #[error("request {0} was cancelled: {1}")]
    Cancelled(String, String),

    #[error("request {0} timed out after {1:?}")]
    TimedOut(String, std::time::Duration),

    #[error("structured content failed output-schema validation: {0}")]
    OutputValidationFailed(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("session expired: {0}")]
    SessionExpired(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("peer returned an error: {0}")]
    Protocol(#[from] CoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl From<&ClientError> for ErrorKind {
    fn from(err: &ClientError) -> Self {
        match err {
            ClientError::MethodNotFound(_) | ClientError::NotInitialized | ClientError::CapabilityNotSupported(_) => {
                ErrorKind::MethodNotFound
            }
            ClientError::Cancelled(..) => ErrorKind::RequestCancelled,
            ClientError::TimedOut(..) => ErrorKind::RequestTimeout,
            ClientError::OutputValidationFailed(_) => ErrorKind::InvalidParams,
            ClientError::ConnectionClosed(_) => ErrorKind::ConnectionClosed,
            ClientError::SessionExpired(_) => ErrorKind::SessionExpired,
            ClientError::Transport(e) => {
                let core: CoreError = e.clone().into();
                core.kind()
            }
            ClientError::Protocol(e) => e.kind(),
            ClientError::Internal(_) => ErrorKind::InternalError,
        }
    }
}

impl From<ClientError> for CoreError {
    fn from(err: ClientError) -> Self {
        if let ClientError::Protocol(inner) = &err {
            return inner.clone();
        }
        let kind = ErrorKind::from(&err);
        CoreError::new(kind, err.to_string()).with_component("conduit-client")
    }
}

/// Whether a managed client should attempt reconnection in response to this
/// error (spec.md §4.7: *connection-closed*, *session-expired*,
/// *transport-error*).
pub fn is_recoverable(err: &ClientError) -> bool {
    matches!(
        ErrorKind::from(err),
        ErrorKind::ConnectionClosed | ErrorKind::SessionExpired | ErrorKind::TransportError
    )
}
