//! Error taxonomy for discovery, registration, token exchange, and the
//! server-side bearer-token helpers.

use thiserror::Error;

/// Errors the OAuth client and server helpers can produce.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("discovery request to {url} failed: {source}")]
    DiscoveryRequest { url: String, #[source] source: reqwest::Error },

    #[error("discovery document at {url} was malformed: {source}")]
    DiscoveryDecode { url: String, #[source] source: serde_json::Error },

    #[error("discovery document at {url} exceeded the {limit}-byte size limit")]
    DiscoveryTooLarge { url: String, limit: usize },

    #[error("discovery request to {url} returned {status}")]
    DiscoveryStatus { url: String, status: u16 },

    #[error("protected resource metadata's resource ({found}) does not match the canonical server URL ({expected})")]
    ResourceMismatch { expected: String, found: String },

    #[error("protected resource metadata lists no authorization server")]
    NoAuthorizationServer,

    #[error("authorization server metadata issuer ({found}) does not match the discovery URL's issuer ({expected})")]
    IssuerMismatch { expected: String, found: String },

    #[error("authorization server does not advertise the S256 PKCE code challenge method")]
    MissingPkceSupport,

    #[error("client registration failed: {0}")]
    Registration(String),

    #[error("token request to {endpoint} failed: {message}")]
    TokenExchange { endpoint: String, message: String },

    #[error("oauth error response: {error}{}", description.as_ref().map(|d| format!(" ({d})")).unwrap_or_default())]
    OAuthError { error: String, description: Option<String> },

    #[error("authorization callback state {received} does not match the expected state {expected}")]
    StateMismatch { expected: String, received: String },

    #[error("invalid resource URI: {0}")]
    InvalidResourceUri(String),

    #[error("no token is cached and the provider cannot refresh without user interaction")]
    NoTokenAvailable,

    #[error("token storage backend failed: {0}")]
    Storage(String),

    #[error("application callback failed: {0}")]
    Callback(String),

    #[error("bearer token missing or malformed")]
    MissingBearerToken,

    #[error("bearer token verification failed: {0}")]
    TokenVerification(String),

    #[error("bearer token audience {found} does not match the server's canonical resource {expected}")]
    AudienceMismatch { expected: String, found: String },

    #[error("bearer token expired")]
    TokenExpired,

    #[error("insufficient scope: requires {required}")]
    InsufficientScope { required: String },
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;
