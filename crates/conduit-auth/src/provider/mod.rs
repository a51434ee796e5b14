//! The three OAuth provider variants (authorization-code+PKCE,
//! client-credentials, private-key JWT) sharing one discovery sequence, one
//! cached-state shape, and the common `tokens()`/`handle_unauthorized`
//! operations spec.md's component design describes as "actor-like": each
//! provider serializes its own refreshes behind a `tokio::sync::Mutex`, so
//! concurrent callers collapse onto a single in-flight refresh.

mod authorization_code;
mod client_credentials;
mod private_key_jwt;
mod token_request;

pub use authorization_code::AuthorizationCodeProvider;
pub use client_credentials::ClientCredentialsProvider;
pub use private_key_jwt::PrivateKeyJwtProvider;

use std::sync::Arc;

use async_trait::async_trait;

use crate::discovery::{AuthorizationServerMetadata, DiscoveryFetcher, ProtectedResourceMetadata};
use crate::error::{AuthError, AuthResult};
use crate::registration::{resolve_client, ClientRegistrationConfig, RegisteredClient};
use crate::storage::TokenStorage;
use crate::types::{TokenSet, UnauthorizedChallenge};

/// Common shape every provider variant implements: hand back a bearer
/// token, and recover from a 401/403 the client transport surfaces.
#[async_trait]
pub trait OAuthProvider: Send + Sync + std::fmt::Debug {
    /// Returns a currently valid access token, refreshing within the
    /// 60-second expiry window when possible. `None` means no token is
    /// cached and none can be obtained without `handle_unauthorized`.
    async fn tokens(&self) -> AuthResult<Option<String>>;

    /// Runs the variant's authorization flow in response to a 401/403. On
    /// `invalid_client`/`unauthorized_client` the cached client registration
    /// and tokens are cleared and the flow retried once; on `invalid_grant`
    /// only the cached tokens are cleared and the flow retried once; any
    /// other error propagates.
    async fn handle_unauthorized(&self, context: UnauthorizedContext) -> AuthResult<()>;
}

/// What triggered `handle_unauthorized`: the parsed `WWW-Authenticate`
/// challenge from the response that failed.
#[derive(Debug, Clone, Default)]
pub struct UnauthorizedContext {
    pub challenge: UnauthorizedChallenge,
}

/// State every variant caches across calls: discovered metadata, the
/// resolved client identity, and the current token set. Guarded by a single
/// `tokio::sync::Mutex` per provider so refreshes single-flight.
#[derive(Debug, Default)]
pub(crate) struct CachedState {
    pub prm: Option<Arc<ProtectedResourceMetadata>>,
    pub as_metadata: Option<Arc<AuthorizationServerMetadata>>,
    pub client: Option<RegisteredClient>,
    pub tokens: Option<TokenSet>,
}

impl CachedState {
    /// Clears client registration and tokens, forcing the next flow to
    /// re-register and re-authorize from scratch.
    pub fn clear_client(&mut self) {
        self.client = None;
        self.tokens = None;
    }

    pub fn clear_tokens(&mut self) {
        self.tokens = None;
    }
}

/// Everything a provider needs to run the shared discovery sequence:
/// the MCP server's canonical URL, a fetcher (cached across calls), and how
/// to resolve a client identity once the authorization server is known.
pub(crate) struct DiscoveryContext {
    pub server_url: String,
    pub fetcher: Arc<DiscoveryFetcher>,
    pub registration: ClientRegistrationConfig,
    pub http: reqwest::Client,
}

impl std::fmt::Debug for DiscoveryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryContext").field("server_url", &self.server_url).finish()
    }
}

/// Runs spec.md §4.4's shared discovery steps 1–4, resolving (and caching,
/// via `state`) PRM, AS metadata, and the client identity.
pub(crate) async fn discover_and_register(
    ctx: &DiscoveryContext,
    state: &mut CachedState,
    challenge_metadata_url: Option<&str>,
) -> AuthResult<(Arc<ProtectedResourceMetadata>, Arc<AuthorizationServerMetadata>, RegisteredClient)> {
    let prm = match (&state.prm, challenge_metadata_url) {
        (Some(cached), None) => Arc::clone(cached),
        _ => {
            let prm = ctx.fetcher.fetch_protected_resource_metadata(&ctx.server_url, challenge_metadata_url).await?;
            state.prm = Some(Arc::clone(&prm));
            prm
        }
    };

    let as_url = prm.authorization_servers.first().ok_or(AuthError::NoAuthorizationServer)?;
    let as_metadata = match &state.as_metadata {
        Some(cached) if cached.issuer.trim_end_matches('/') == as_url.trim_end_matches('/') => Arc::clone(cached),
        _ => {
            let metadata = ctx.fetcher.fetch_authorization_server_metadata(as_url).await?;
            state.as_metadata = Some(Arc::clone(&metadata));
            metadata
        }
    };

    let client = match &state.client {
        Some(client) => client.clone(),
        None => {
            let client = resolve_client(&ctx.http, &as_metadata, &ctx.registration).await?;
            state.client = Some(client.clone());
            client
        }
    };

    Ok((prm, as_metadata, client))
}

/// Classifies an OAuth token-endpoint error response per spec.md §4.4's
/// recovery rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenErrorClass {
    ClearClientAndRetry,
    ClearTokensAndRetry,
    Propagate,
}

pub(crate) fn classify_oauth_error(error: &str) -> TokenErrorClass {
    match error {
        "invalid_client" | "unauthorized_client" => TokenErrorClass::ClearClientAndRetry,
        "invalid_grant" => TokenErrorClass::ClearTokensAndRetry,
        _ => TokenErrorClass::Propagate,
    }
}

/// Persists `tokens` both in the in-process cache and the pluggable
/// storage backend, keyed by the authorization server's issuer.
pub(crate) async fn persist_tokens(
    storage: &dyn TokenStorage,
    issuer: &str,
    state: &mut CachedState,
    tokens: TokenSet,
) -> AuthResult<()> {
    storage.store(issuer, tokens.clone()).await?;
    state.tokens = Some(tokens);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_invalid_client_as_clear_and_retry() {
        assert_eq!(classify_oauth_error("invalid_client"), TokenErrorClass::ClearClientAndRetry);
        assert_eq!(classify_oauth_error("unauthorized_client"), TokenErrorClass::ClearClientAndRetry);
    }

    #[test]
    fn classifies_invalid_grant_as_clear_tokens_and_retry() {
        assert_eq!(classify_oauth_error("invalid_grant"), TokenErrorClass::ClearTokensAndRetry);
    }

    #[test]
    fn classifies_other_errors_as_propagate() {
        assert_eq!(classify_oauth_error("server_error"), TokenErrorClass::Propagate);
    }

    #[test]
    fn clear_client_also_clears_tokens() {
        let mut state = CachedState { client: Some(RegisteredClient { client_id: "c".to_string(), client_secret: None }), ..Default::default() };
        state.clear_client();
        assert!(state.client.is_none());
        assert!(state.tokens.is_none());
    }
}
