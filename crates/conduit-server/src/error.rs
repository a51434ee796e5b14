//! The server-role error type: maps registry, validation, and dispatch
//! failures onto the shared [`conduit_core::ErrorKind`] taxonomy so a
//! transport can turn any of these into a JSON-RPC error response without
//! knowing which subsystem raised it.

use conduit_core::{Error as CoreError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("tool '{0}' is not registered")]
    ToolNotFound(String),

    #[error("tool '{0}' is disabled")]
    ToolDisabled(String),

    #[error("prompt '{0}' is not registered")]
    PromptNotFound(String),

    #[error("prompt '{0}' is disabled")]
    PromptDisabled(String),

    #[error("resource '{0}' is not registered")]
    ResourceNotFound(String),

    #[error("resource '{0}' is disabled")]
    ResourceDisabled(String),

    #[error("'{0}' is already registered")]
    DuplicateRegistration(String),

    #[error("schema validation failed: {0}")]
    ValidationFailed(String),

    #[error("request must complete the initialize handshake first")]
    NotInitialized,

    #[error("peer does not advertise the '{0}' capability")]
    CapabilityNotSupported(String),

    #[error("request {0} was cancelled: {1}")]
    Cancelled(String, String),

    #[error("request {0} timed out after {1:?}")]
    TimedOut(String, std::time::Duration),

    #[error("bidirectional communication is not configured on this server")]
    PeerUnavailable,

    #[error("handler error: {0}")]
    Handler(#[from] CoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = std::result::Result<T, ServerError>;

impl From<&ServerError> for ErrorKind {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::MethodNotFound(_) => ErrorKind::MethodNotFound,
            ServerError::ToolNotFound(_)
            | ServerError::PromptNotFound(_)
            | ServerError::ResourceNotFound(_) => ErrorKind::ResourceNotFound,
            ServerError::ToolDisabled(_)
            | ServerError::PromptDisabled(_)
            | ServerError::ResourceDisabled(_)
            | ServerError::DuplicateRegistration(_)
            | ServerError::ValidationFailed(_) => ErrorKind::InvalidParams,
            ServerError::NotInitialized | ServerError::CapabilityNotSupported(_) => {
                ErrorKind::MethodNotFound
            }
            ServerError::Cancelled(..) => ErrorKind::RequestCancelled,
            ServerError::TimedOut(..) => ErrorKind::RequestTimeout,
            ServerError::PeerUnavailable => ErrorKind::TransportError,
            ServerError::Handler(e) => e.kind(),
            ServerError::Internal(_) => ErrorKind::InternalError,
        }
    }
}

impl From<ServerError> for CoreError {
    fn from(err: ServerError) -> Self {
        if let ServerError::Handler(inner) = &err {
            return inner.clone();
        }
        let kind = ErrorKind::from(&err);
        CoreError::new(kind, err.to_string()).with_component("conduit-server")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_not_found_maps_to_resource_not_found_kind() {
        let err = ServerError::ToolNotFound("add".into());
        assert_eq!(ErrorKind::from(&err), ErrorKind::ResourceNotFound);
    }

    #[test]
    fn conversion_to_core_error_preserves_message() {
        let err = ServerError::ToolDisabled("add".into());
        let core: CoreError = err.into();
        assert!(core.message().contains("add"));
    }

    #[test]
    fn handler_variant_passes_through_the_wrapped_kind() {
        let inner = CoreError::session_expired("mcp-abc");
        let err = ServerError::Handler(inner);
        assert_eq!(ErrorKind::from(&err), ErrorKind::SessionExpired);
    }
}
