/// The taxonomy of errors an endpoint, transport, or OAuth subsystem can
/// produce, each mapped to a JSON-RPC error code and (where applicable) an
/// HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ResourceNotFound,
    UrlElicitationRequired,
    ConnectionClosed,
    RequestTimeout,
    TransportError,
    RequestCancelled,
    SessionExpired,
    /// Application-defined server error in the reserved `-32099..-32000` range.
    ServerError(i32),
}

impl ErrorKind {
    /// The JSON-RPC 2.0 error code this kind maps to.
    pub const fn jsonrpc_code(&self) -> i32 {
        match self {
            ErrorKind::ParseError => -32700,
            ErrorKind::InvalidRequest => -32600,
            ErrorKind::MethodNotFound => -32601,
            ErrorKind::InvalidParams => -32602,
            ErrorKind::InternalError => -32603,
            ErrorKind::ResourceNotFound => -32002,
            ErrorKind::UrlElicitationRequired => -32042,
            ErrorKind::ConnectionClosed => -32000,
            ErrorKind::RequestTimeout => -32001,
            ErrorKind::TransportError => -32003,
            ErrorKind::RequestCancelled => -32004,
            ErrorKind::SessionExpired => -32005,
            ErrorKind::ServerError(code) => *code,
        }
    }

    /// The HTTP status code a streamable-HTTP transport should surface this
    /// kind as, when the error arises at the HTTP boundary rather than inside
    /// a JSON-RPC payload.
    pub const fn http_status(&self) -> u16 {
        match self {
            ErrorKind::ParseError | ErrorKind::InvalidRequest | ErrorKind::InvalidParams => 400,
            ErrorKind::MethodNotFound | ErrorKind::ResourceNotFound => 404,
            ErrorKind::SessionExpired => 404,
            ErrorKind::RequestCancelled => 409,
            ErrorKind::RequestTimeout => 408,
            ErrorKind::InternalError
            | ErrorKind::UrlElicitationRequired
            | ErrorKind::ConnectionClosed
            | ErrorKind::TransportError => 500,
            ErrorKind::ServerError(_) => 500,
        }
    }

    /// Whether a caller may retry the operation that produced this error.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::UrlElicitationRequired
                | ErrorKind::ConnectionClosed
                | ErrorKind::TransportError
                | ErrorKind::SessionExpired
        )
    }

    /// Whether the underlying condition is expected to resolve on its own
    /// (a dropped connection) as opposed to being a property of the request
    /// itself (malformed params).
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::ConnectionClosed | ErrorKind::TransportError | ErrorKind::SessionExpired
        )
    }

    /// Recovers a kind from a JSON-RPC error code on the wire, the inverse
    /// of [`ErrorKind::jsonrpc_code`] — used when a caller turns a peer's
    /// error response back into this taxonomy.
    pub const fn from_jsonrpc_code(code: i32) -> ErrorKind {
        match code {
            -32700 => ErrorKind::ParseError,
            -32600 => ErrorKind::InvalidRequest,
            -32601 => ErrorKind::MethodNotFound,
            -32602 => ErrorKind::InvalidParams,
            -32603 => ErrorKind::InternalError,
            -32002 => ErrorKind::ResourceNotFound,
            -32042 => ErrorKind::UrlElicitationRequired,
            -32000 => ErrorKind::ConnectionClosed,
            -32001 => ErrorKind::RequestTimeout,
            -32003 => ErrorKind::TransportError,
            -32004 => ErrorKind::RequestCancelled,
            -32005 => ErrorKind::SessionExpired,
            other => ErrorKind::ServerError(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_taxonomy_table() {
        assert_eq!(ErrorKind::ParseError.jsonrpc_code(), -32700);
        assert_eq!(ErrorKind::InvalidRequest.jsonrpc_code(), -32600);
        assert_eq!(ErrorKind::MethodNotFound.jsonrpc_code(), -32601);
        assert_eq!(ErrorKind::InvalidParams.jsonrpc_code(), -32602);
        assert_eq!(ErrorKind::InternalError.jsonrpc_code(), -32603);
        assert_eq!(ErrorKind::ResourceNotFound.jsonrpc_code(), -32002);
        assert_eq!(ErrorKind::UrlElicitationRequired.jsonrpc_code(), -32042);
        assert_eq!(ErrorKind::ConnectionClosed.jsonrpc_code(), -32000);
        assert_eq!(ErrorKind::RequestTimeout.jsonrpc_code(), -32001);
        assert_eq!(ErrorKind::TransportError.jsonrpc_code(), -32003);
        assert_eq!(ErrorKind::RequestCancelled.jsonrpc_code(), -32004);
        assert_eq!(ErrorKind::SessionExpired.jsonrpc_code(), -32005);
    }

    #[test]
    fn retryable_kinds_match_spec_recovery_policy() {
        assert!(ErrorKind::ConnectionClosed.is_retryable());
        assert!(ErrorKind::SessionExpired.is_retryable());
        assert!(!ErrorKind::InvalidParams.is_retryable());
        assert!(!ErrorKind::ParseError.is_retryable());
    }

    #[test]
    fn session_expired_surfaces_as_http_404() {
        assert_eq!(ErrorKind::SessionExpired.http_status(), 404);
    }

    #[test]
    fn from_jsonrpc_code_inverts_jsonrpc_code_for_named_kinds() {
        assert_eq!(ErrorKind::from_jsonrpc_code(-32601), ErrorKind::MethodNotFound);
        assert_eq!(ErrorKind::from_jsonrpc_code(-32005), ErrorKind::SessionExpired);
    }

    #[test]
    fn from_jsonrpc_code_falls_back_to_server_error_for_unknown_codes() {
        assert_eq!(ErrorKind::from_jsonrpc_code(-32050), ErrorKind::ServerError(-32050));
    }
}
