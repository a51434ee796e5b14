//! Private-key JWT client authentication (RFC 7523). The application mints
//! the signed assertion (`iss`/`sub` = client id, `aud` = AS issuer, short
//! `exp`, unique `jti`); this provider only ever asks for a fresh one and
//! wires it into the token request.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::token_request::exchange_private_key_jwt;
use super::{classify_oauth_error, discover_and_register, persist_tokens, CachedState, DiscoveryContext, OAuthProvider, TokenErrorClass, UnauthorizedContext};
use crate::error::{AuthError, AuthResult};
use crate::registration::{ClientRegistrationConfig, RegisteredClient};
use crate::resource::canonicalize_resource_uri;
use crate::scope::select_scope;
use crate::storage::TokenStorage;
use crate::types::TokenSet;

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// `assertion_provider(audience) -> jwt`, supplied by the application.
pub type AssertionProvider = Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = AuthResult<String>> + Send>> + Send + Sync>;

pub struct PrivateKeyJwtProvider {
    ctx: DiscoveryContext,
    state: Mutex<CachedState>,
    storage: Arc<dyn TokenStorage>,
    configured_scope: Option<String>,
    assertion_provider: AssertionProvider,
}

impl std::fmt::Debug for PrivateKeyJwtProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKeyJwtProvider").field("server_url", &self.ctx.server_url).finish()
    }
}

impl PrivateKeyJwtProvider {
    pub fn new(
        server_url: impl Into<String>,
        client_id: impl Into<String>,
        registration: ClientRegistrationConfig,
        storage: Arc<dyn TokenStorage>,
        configured_scope: Option<String>,
        assertion_provider: AssertionProvider,
    ) -> Self {
        let client_id = client_id.into();
        let mut registration = registration;
        if registration.static_client.is_none() {
            registration.static_client = Some(RegisteredClient { client_id, client_secret: None });
        }
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
            assertion_provider,
        }
    }

    async fn run_flow(&self) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        let (prm, as_metadata, client) = discover_and_register(&self.ctx, &mut state, None).await?;

        let assertion = (self.assertion_provider)(as_metadata.issuer.clone()).await?;

        let resource = canonicalize_resource_uri(&self.ctx.server_url)?;
        let scope = select_scope(None, prm.scopes_supported.as_deref(), None, as_metadata.scopes_supported.as_deref(), self.configured_scope.as_deref());

        let tokens = exchange_private_key_jwt(
            &self.ctx.http,
            &as_metadata.token_endpoint,
            &client.client_id,
            &assertion,
            CLIENT_ASSERTION_TYPE,
            scope.as_deref(),
            &resource,
        )
        .await?;
        persist_tokens(self.storage.as_ref(), &as_metadata.issuer, &mut state, tokens).await
    }
}

#[async_trait]
impl OAuthProvider for PrivateKeyJwtProvider {
    async fn tokens(&self) -> AuthResult<Option<String>> {
        {
            let state = self.state.lock().await;
            if let Some(tokens) = &state.tokens {
                if !tokens.needs_refresh() {
                    return Ok(Some(tokens.authorization_header()));
                }
            }
        }
        // Refresh reuses a freshly-minted assertion rather than a refresh
        // token, since private-key JWT clients authenticate themselves on
        // every request.
        self.run_flow().await?;
        let state = self.state.lock().await;
        Ok(state.tokens.as_ref().map(TokenSet::authorization_header))
    }

    async fn handle_unauthorized(&self, _context: UnauthorizedContext) -> AuthResult<()> {
        match self.run_flow().await {
            Ok(()) => Ok(()),
            Err(AuthError::OAuthError { error, .. }) => match classify_oauth_error(&error) {
                TokenErrorClass::ClearClientAndRetry => {
                    self.state.lock().await.clear_client();
                    self.run_flow().await
                }
                TokenErrorClass::ClearTokensAndRetry => {
                    self.state.lock().await.clear_tokens();
                    self.run_flow().await
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

    #[tokio::test]
    async fn uses_a_freshly_minted_assertion_for_each_flow() {
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
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "pkj-token",
                "expires_in": 300,
            })))
            .mount(&server)
            .await;

        let calls = Arc::new(tokio::sync::Mutex::new(0u32));
        let calls_for_closure = Arc::clone(&calls);
        let provider = PrivateKeyJwtProvider::new(
            resource,
            "client-id",
            ClientRegistrationConfig::default(),
            Arc::new(crate::storage::InMemoryTokenStorage::new()),
            None,
            Arc::new(move |_audience| {
                let calls = Arc::clone(&calls_for_closure);
                Box::pin(async move {
                    *calls.lock().await += 1;
                    Ok("signed-jwt-assertion".to_string())
                })
            }),
        );

        let header = provider.tokens().await.unwrap().unwrap();
        assert_eq!(header, "Bearer pkj-token");
        assert_eq!(*calls.lock().await, 1);
    }
}
