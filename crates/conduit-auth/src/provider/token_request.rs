//! The token-endpoint POST every flow ends with, built on `oauth2::basic::BasicClient`'s
//! typestate request builders rather than a hand-rolled form post: RFC-correct
//! parameter names, basic-auth-vs-body client authentication, and typed
//! success/error response parsing come from the crate instead of being
//! reimplemented here.

use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::{
    AuthType, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet, PkceCodeVerifier, RedirectUrl,
    RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
};

use crate::error::{AuthError, AuthResult};
use crate::types::TokenSet;

type TokenClient = BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

fn build_client(
    token_endpoint: &str,
    client_id: &str,
    client_secret: Option<&str>,
    redirect_uri: Option<&str>,
    use_basic_auth: bool,
) -> AuthResult<TokenClient> {
    let token_url = TokenUrl::new(token_endpoint.to_string()).map_err(|e| AuthError::TokenExchange {
        endpoint: token_endpoint.to_string(),
        message: format!("invalid token endpoint: {e}"),
    })?;
    let mut client = BasicClient::new(ClientId::new(client_id.to_string())).set_token_uri(token_url);
    if let Some(secret) = client_secret {
        client = client.set_client_secret(ClientSecret::new(secret.to_string()));
    }
    if let Some(redirect_uri) = redirect_uri {
        let redirect_url = RedirectUrl::new(redirect_uri.to_string()).map_err(|e| AuthError::TokenExchange {
            endpoint: token_endpoint.to_string(),
            message: format!("invalid redirect uri: {e}"),
        })?;
        client = client.set_redirect_uri(redirect_url);
    }
    if !use_basic_auth {
        client = client.set_auth_type(AuthType::RequestBody);
    }
    Ok(client)
}

fn map_err<RE>(token_endpoint: &str, err: RequestTokenError<RE, BasicErrorResponse>) -> AuthError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(resp) => {
            AuthError::OAuthError { error: resp.error().as_ref().to_string(), description: resp.error_description().cloned() }
        }
        other => AuthError::TokenExchange { endpoint: token_endpoint.to_string(), message: other.to_string() },
    }
}

fn token_response_to_token_set(response: BasicTokenResponse) -> TokenSet {
    TokenSet::new(response.access_token().secret().clone(), response.expires_in())
        .with_refresh_token(response.refresh_token().map(|t| t.secret().clone()))
        .with_token_type(format!("{:?}", response.token_type()))
        .with_scope(response.scopes().map(|scopes| scopes.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")))
}

/// Authorization code + PKCE exchange (RFC 6749 §4.1.3, RFC 7636).
#[allow(clippy::too_many_arguments)]
pub(crate) async fn exchange_authorization_code(
    http: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    client_secret: Option<&str>,
    redirect_uri: &str,
    code: &str,
    code_verifier: &str,
    resource: &str,
    use_basic_auth: bool,
) -> AuthResult<TokenSet> {
    let client = build_client(token_endpoint, client_id, client_secret, Some(redirect_uri), use_basic_auth)?;
    let response = client
        .exchange_code(AuthorizationCode::new(code.to_string()))
        .set_pkce_verifier(PkceCodeVerifier::new(code_verifier.to_string()))
        .add_extra_param("resource", resource.to_string())
        .request_async(http)
        .await
        .map_err(|e| map_err(token_endpoint, e))?;
    Ok(token_response_to_token_set(response))
}

/// Refresh token grant (RFC 6749 §6).
#[allow(clippy::too_many_arguments)]
pub(crate) async fn exchange_refresh_token(
    http: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    client_secret: Option<&str>,
    refresh_token: &str,
    resource: &str,
    use_basic_auth: bool,
) -> AuthResult<TokenSet> {
    let client = build_client(token_endpoint, client_id, client_secret, None, use_basic_auth)?;
    let response = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .add_extra_param("resource", resource.to_string())
        .request_async(http)
        .await
        .map_err(|e| map_err(token_endpoint, e))?;
    Ok(token_response_to_token_set(response))
}

/// Client credentials grant (RFC 6749 §4.4).
#[allow(clippy::too_many_arguments)]
pub(crate) async fn exchange_client_credentials(
    http: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    client_secret: Option<&str>,
    scope: Option<&str>,
    resource: &str,
    use_basic_auth: bool,
) -> AuthResult<TokenSet> {
    let client = build_client(token_endpoint, client_id, client_secret, None, use_basic_auth)?;
    let mut request = client.exchange_client_credentials().add_extra_param("resource", resource.to_string());
    if let Some(scope) = scope {
        request = request.add_scope(Scope::new(scope.to_string()));
    }
    let response = request.request_async(http).await.map_err(|e| map_err(token_endpoint, e))?;
    Ok(token_response_to_token_set(response))
}

/// Private-key JWT client authentication (RFC 7523) over the client
/// credentials grant: the signed assertion stands in for a client secret, so
/// no basic auth is ever used here.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn exchange_private_key_jwt(
    http: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    assertion: &str,
    client_assertion_type: &str,
    scope: Option<&str>,
    resource: &str,
) -> AuthResult<TokenSet> {
    let client = build_client(token_endpoint, client_id, None, None, false)?;
    let mut request = client
        .exchange_client_credentials()
        .add_extra_param("resource", resource.to_string())
        .add_extra_param("client_assertion_type", client_assertion_type.to_string())
        .add_extra_param("client_assertion", assertion.to_string());
    if let Some(scope) = scope {
        request = request.add_scope(Scope::new(scope.to_string()));
    }
    let response = request.request_async(http).await.map_err(|e| map_err(token_endpoint, e))?;
    Ok(token_response_to_token_set(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_a_successful_token_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "abc123",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "refresh-abc",
            })))
            .mount(&server)
            .await;

        let tokens = exchange_client_credentials(&reqwest::Client::new(), &server.uri(), "client-id", None, None, "https://mcp.example.com", true)
            .await
            .unwrap();
        assert_eq!(tokens.access_token(), "abc123");
        assert_eq!(tokens.refresh_token(), Some("refresh-abc"));
    }

    #[tokio::test]
    async fn surfaces_oauth_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "refresh token expired",
            })))
            .mount(&server)
            .await;

        let err = exchange_refresh_token(&reqwest::Client::new(), &server.uri(), "client-id", None, "stale-refresh", "https://mcp.example.com", true)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::OAuthError { error, .. } if error == "invalid_grant"));
    }
}
