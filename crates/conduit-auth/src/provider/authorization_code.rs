//! Authorization code flow with PKCE (RFC 6749 §4.1 + RFC 7636). Unlike the
//! other two variants, `tokens()` can only refresh an existing token; the
//! interactive redirect/callback round trip only ever runs from
//! `handle_unauthorized`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::token_request::{exchange_authorization_code, exchange_refresh_token};
use super::{classify_oauth_error, discover_and_register, persist_tokens, CachedState, DiscoveryContext, OAuthProvider, TokenErrorClass, UnauthorizedContext};
use crate::discovery::AuthorizationServerMetadata;
use crate::error::{AuthError, AuthResult};
use crate::pkce::AuthorizationRequest;
use crate::registration::ClientRegistrationConfig;
use crate::resource::canonicalize_resource_uri;
use crate::scope::select_scope;
use crate::storage::TokenStorage;
use crate::types::TokenSet;

/// Called with the authorization URL to send the user to; does not block on
/// the user completing the flow.
pub type RedirectHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Awaits the application's OAuth redirect callback and returns the
/// `(code, state)` pair it received.
pub type CallbackHandler = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = AuthResult<(String, String)>> + Send>> + Send + Sync>;

pub struct AuthorizationCodeProvider {
    ctx: DiscoveryContext,
    state: Mutex<CachedState>,
    storage: Arc<dyn TokenStorage>,
    configured_scope: Option<String>,
    redirect_uri: String,
    redirect_handler: RedirectHandler,
    callback_handler: CallbackHandler,
}

impl std::fmt::Debug for AuthorizationCodeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCodeProvider").field("server_url", &self.ctx.server_url).finish()
    }
}

impl AuthorizationCodeProvider {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        server_url: impl Into<String>,
        redirect_uri: impl Into<String>,
        registration: ClientRegistrationConfig,
        storage: Arc<dyn TokenStorage>,
        configured_scope: Option<String>,
        redirect_handler: RedirectHandler,
        callback_handler: CallbackHandler,
    ) -> Self {
        Self {
            ctx: DiscoveryContext {
                server_url: server_url.into(),
                fetcher: Arc::new(crate::discovery::DiscoveryFetcher::new()),
                registration,
                http: reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()).build().expect("static reqwest config builds"),
            },
            state: Mutex::new(CachedState::default()),
            storage,
            configured_scope,
            redirect_uri: redirect_uri.into(),
            redirect_handler,
            callback_handler,
        }
    }

    /// Runs the interactive authorization-code+PKCE round trip: discovery,
    /// redirect, await callback, state check, code exchange.
    async fn authorize(&self) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        let (prm, as_metadata, client) = discover_and_register(&self.ctx, &mut state, None).await?;

        if !as_metadata.supports_pkce_s256() {
            return Err(AuthError::MissingPkceSupport);
        }

        let request = AuthorizationRequest::generate();
        let resource = canonicalize_resource_uri(&self.ctx.server_url)?;
        let scope = select_scope(None, prm.scopes_supported.as_deref(), None, as_metadata.scopes_supported.as_deref(), self.configured_scope.as_deref());

        let authorization_url = build_authorization_url(&as_metadata, &client.client_id, &self.redirect_uri, &resource, scope.as_deref(), &request);

        (self.redirect_handler)(authorization_url);
        let (code, received_state) = (self.callback_handler)().await?;
        if received_state != request.state {
            return Err(AuthError::StateMismatch { expected: request.state, received: received_state });
        }

        let auth_method = as_metadata.preferred_token_auth_method(client.client_secret.is_some());
        let use_basic_auth = auth_method == "client_secret_basic";

        let tokens = exchange_authorization_code(
            &self.ctx.http,
            &as_metadata.token_endpoint,
            &client.client_id,
            client.client_secret.as_deref(),
            &self.redirect_uri,
            &code,
            &request.code_verifier,
            &resource,
            use_basic_auth,
        )
        .await?;
        persist_tokens(self.storage.as_ref(), &as_metadata.issuer, &mut state, tokens).await
    }

    async fn refresh(&self) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        let Some(refresh_token) = state.tokens.as_ref().and_then(TokenSet::refresh_token).map(str::to_string) else {
            return Err(AuthError::NoTokenAvailable);
        };
        let Some(as_metadata) = state.as_metadata.clone() else {
            return Err(AuthError::NoTokenAvailable);
        };
        let Some(client) = state.client.clone() else {
            return Err(AuthError::NoTokenAvailable);
        };

        let resource = canonicalize_resource_uri(&self.ctx.server_url)?;
        let use_basic_auth = as_metadata.preferred_token_auth_method(client.client_secret.is_some()) == "client_secret_basic";

        let tokens = exchange_refresh_token(
            &self.ctx.http,
            &as_metadata.token_endpoint,
            &client.client_id,
            client.client_secret.as_deref(),
            &refresh_token,
            &resource,
            use_basic_auth,
        )
        .await?;
        persist_tokens(self.storage.as_ref(), &as_metadata.issuer, &mut state, tokens).await
    }
}

fn build_authorization_url(
    as_metadata: &AuthorizationServerMetadata,
    client_id: &str,
    redirect_uri: &str,
    resource: &str,
    scope: Option<&str>,
    request: &AuthorizationRequest,
) -> String {
    let mut url = url::Url::parse(&as_metadata.authorization_endpoint).expect("validated during discovery");
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("response_type", "code");
        query.append_pair("client_id", client_id);
        query.append_pair("redirect_uri", redirect_uri);
        query.append_pair("state", &request.state);
        query.append_pair("code_challenge", &request.code_challenge);
        query.append_pair("code_challenge_method", request.code_challenge_method);
        query.append_pair("resource", resource);
        if let Some(scope) = scope {
            query.append_pair("scope", scope);
        }
    }
    url.to_string()
}

#[async_trait]
impl OAuthProvider for AuthorizationCodeProvider {
    async fn tokens(&self) -> AuthResult<Option<String>> {
        {
            let state = self.state.lock().await;
            if let Some(tokens) = &state.tokens {
                if !tokens.needs_refresh() {
                    return Ok(Some(tokens.authorization_header()));
                }
            }
        }
        match self.refresh().await {
            Ok(()) => {
                let state = self.state.lock().await;
                Ok(state.tokens.as_ref().map(TokenSet::authorization_header))
            }
            Err(_) => Ok(None),
        }
    }

    async fn handle_unauthorized(&self, _context: UnauthorizedContext) -> AuthResult<()> {
        match self.authorize().await {
            Ok(()) => Ok(()),
            Err(AuthError::OAuthError { error, .. }) => match classify_oauth_error(&error) {
                TokenErrorClass::ClearClientAndRetry => {
                    self.state.lock().await.clear_client();
                    self.authorize().await
                }
                TokenErrorClass::ClearTokensAndRetry => {
                    self.state.lock().await.clear_tokens();
                    self.authorize().await
                }
                TokenErrorClass::Propagate => Err(AuthError::OAuthError { error, description: None }),
            },
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn noop_redirect() -> RedirectHandler {
        Arc::new(|_url| {})
    }

    #[tokio::test]
    async fn completes_the_round_trip_when_state_matches() {
        let server = MockServer::start().await;
        let resource = server.uri();
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-protected-resource"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resource": resource,
                "authorization_servers": [resource],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-authorization-server"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": resource,
                "authorization_endpoint": format!("{resource}/authorize"),
                "token_endpoint": format!("{resource}/token"),
                "code_challenge_methods_supported": ["S256"],
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ac-token",
                "refresh_token": "ac-refresh",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        let seen_state = Arc::new(std::sync::Mutex::new(String::new()));
        let seen_state_for_callback = Arc::clone(&seen_state);
        let redirect_captured_state = Arc::clone(&seen_state);
        let redirect_handler: RedirectHandler = Arc::new(move |url| {
            let parsed = url::Url::parse(&url).unwrap();
            let state = parsed.query_pairs().find(|(k, _)| k == "state").unwrap().1.to_string();
            *redirect_captured_state.lock().unwrap() = state;
        });
        let callback_handler: CallbackHandler = Arc::new(move || {
            let seen_state = Arc::clone(&seen_state_for_callback);
            Box::pin(async move {
                let state = seen_state.lock().unwrap().clone();
                Ok(("auth-code".to_string(), state))
            })
        });

        let provider = AuthorizationCodeProvider::new(
            resource,
            "https://app.example.com/callback",
            ClientRegistrationConfig { static_client: Some(crate::registration::RegisteredClient { client_id: "client-id".to_string(), client_secret: None }), ..Default::default() },
            Arc::new(crate::storage::InMemoryTokenStorage::new()),
            None,
            redirect_handler,
            callback_handler,
        );

        provider.handle_unauthorized(UnauthorizedContext::default()).await.unwrap();
        let header = provider.tokens().await.unwrap().unwrap();
        assert_eq!(header, "Bearer ac-token");
    }

    #[tokio::test]
    async fn state_mismatch_is_rejected() {
        let server = MockServer::start().await;
        let resource = server.uri();
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-protected-resource"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resource": resource,
                "authorization_servers": [resource],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-authorization-server"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": resource,
                "authorization_endpoint": format!("{resource}/authorize"),
                "token_endpoint": format!("{resource}/token"),
                "code_challenge_methods_supported": ["S256"],
            })))
            .mount(&server)
            .await;

        let callback_handler: CallbackHandler = Arc::new(|| Box::pin(async { Ok(("code".to_string(), "wrong-state".to_string())) }));

        let provider = AuthorizationCodeProvider::new(
            resource,
            "https://app.example.com/callback",
            ClientRegistrationConfig { static_client: Some(crate::registration::RegisteredClient { client_id: "client-id".to_string(), client_secret: None }), ..Default::default() },
            Arc::new(crate::storage::InMemoryTokenStorage::new()),
            None,
            noop_redirect(),
            callback_handler,
        );

        let err = provider.handle_unauthorized(UnauthorizedContext::default()).await.unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch { .. }));
    }

    #[tokio::test]
    async fn tokens_returns_none_without_a_cached_or_refreshable_token() {
        let provider = AuthorizationCodeProvider::new(
            "https://mcp.example.com",
            "https://app.example.com/callback",
            ClientRegistrationConfig::default(),
            Arc::new(crate::storage::InMemoryTokenStorage::new()),
            None,
            noop_redirect(),
            Arc::new(|| Box::pin(async { Ok((String::new(), String::new())) })),
        );
        assert_eq!(provider.tokens().await.unwrap(), None);
    }
}
