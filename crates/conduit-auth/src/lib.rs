//! OAuth 2.0 client subsystem and bearer-token server helpers for MCP.
//!
//! Three provider variants share one discovery sequence (RFC 9728 Protected
//! Resource Metadata, RFC 8414 Authorization Server Metadata), one client
//! registration step (CIMD or Dynamic Client Registration), and the common
//! [`OAuthProvider`] operations:
//!
//! - [`AuthorizationCodeProvider`] — authorization code + PKCE, for
//!   interactive clients.
//! - [`ClientCredentialsProvider`] — server-to-server, no user interaction.
//! - [`PrivateKeyJwtProvider`] — RFC 7523, the application mints the signed
//!   assertion.
//!
//! On the server side, [`server::authenticate_request`] verifies an inbound
//! bearer token and [`server::protected_resource_metadata`] serves the PRM
//! document clients use to discover where to authenticate.

pub mod discovery;
pub mod error;
pub mod pkce;
pub mod provider;
pub mod registration;
pub mod resource;
pub mod scope;
pub mod server;
pub mod storage;
pub mod types;

pub use discovery::{AuthorizationServerMetadata, DiscoveryFetcher, ProtectedResourceMetadata};
pub use error::{AuthError, AuthResult};
pub use pkce::AuthorizationRequest;
pub use provider::{AuthorizationCodeProvider, ClientCredentialsProvider, OAuthProvider, PrivateKeyJwtProvider, UnauthorizedContext};
pub use registration::{ClientRegistrationConfig, RegisteredClient};
pub use resource::{canonicalize_resource_uri, resource_matches};
pub use scope::select_scope;
pub use server::{authenticate_request, insufficient_scope, AuthOutcome, OAuthServerConfig, UnauthorizedResponse, VerifyToken};
pub use storage::{InMemoryTokenStorage, TokenStorage};
pub use types::{AuthInfo, TokenSet, UnauthorizedChallenge};
