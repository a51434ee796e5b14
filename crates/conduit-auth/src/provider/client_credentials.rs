//! Client credentials grant (RFC 6749 §4.4): server-to-server, no user
//! interaction. `handle_unauthorized` just re-runs the same POST.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::token_request::exchange_client_credentials;
use super::{classify_oauth_error, discover_and_register, persist_tokens, CachedState, DiscoveryContext, OAuthProvider, TokenErrorClass, UnauthorizedContext};
use crate::error::{AuthError, AuthResult};
use crate::registration::{ClientRegistrationConfig, RegisteredClient};
use crate::resource::canonicalize_resource_uri;
use crate::scope::select_scope;
use crate::storage::TokenStorage;
use crate::types::TokenSet;

pub struct ClientCredentialsProvider {
    ctx: DiscoveryContext,
    state: Mutex<CachedState>,
    storage: Arc<dyn TokenStorage>,
    configured_scope: Option<String>,
    client_secret: Option<String>,
}

impl std::fmt::Debug for ClientCredentialsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsProvider").field("server_url", &self.ctx.server_url).finish()
    }
}

impl ClientCredentialsProvider {
    pub fn new(
        server_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<String>,
        registration: ClientRegistrationConfig,
        storage: Arc<dyn TokenStorage>,
        configured_scope: Option<String>,
    ) -> Self {
        let client_id = client_id.into();
        let mut registration = registration;
        if registration.static_client.is_none() {
            registration.static_client = Some(RegisteredClient { client_id, client_secret: client_secret.clone() });
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
            client_secret,
        }
    }

    async fn run_flow(&self) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        let (prm, as_metadata, client) = discover_and_register(&self.ctx, &mut state, None).await?;

        let resource = canonicalize_resource_uri(&self.ctx.server_url)?;
        let scope = select_scope(None, prm.scopes_supported.as_deref(), None, as_metadata.scopes_supported.as_deref(), self.configured_scope.as_deref());

        let use_basic_auth = as_metadata.preferred_token_auth_method(self.client_secret.is_some()) == "client_secret_basic";

        let tokens = exchange_client_credentials(
            &self.ctx.http,
            &as_metadata.token_endpoint,
            &client.client_id,
            self.client_secret.as_deref(),
            scope.as_deref(),
            &resource,
            use_basic_auth,
        )
        .await?;
        persist_tokens(self.storage.as_ref(), &as_metadata.issuer, &mut state, tokens).await
    }
}

#[async_trait]
impl OAuthProvider for ClientCredentialsProvider {
    async fn tokens(&self) -> AuthResult<Option<String>> {
        {
            let state = self.state.lock().await;
            if let Some(tokens) = &state.tokens {
                if !tokens.needs_refresh() {
                    return Ok(Some(tokens.authorization_header()));
                }
            }
        }
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
