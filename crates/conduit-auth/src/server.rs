//! Server-side bearer-token helpers (spec.md §4.5): verifying an inbound
//! request's `Authorization` header, building the 401/403 envelope
//! (§6.2), and serving Protected Resource Metadata (§6.1).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::discovery::{discovery_url, ProtectedResourceMetadata};
use crate::error::{AuthError, AuthResult};
use crate::resource::resource_matches;
use crate::types::AuthInfo;

/// Verifies a bearer token and returns the identity it authenticates as.
/// Applications supply this (token introspection, JWT verification against
/// a JWKS, a session lookup — whatever fits their authorization server).
pub type VerifyToken = Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = AuthResult<AuthInfo>> + Send>> + Send + Sync>;

/// What `authenticate_request`/`insufficient_scope`/
/// `protected_resource_metadata` need to know about this server.
#[derive(Clone)]
pub struct OAuthServerConfig {
    /// This server's own canonical URL, checked against a verified token's
    /// `audience`.
    pub canonical_url: String,
    pub verify_token: VerifyToken,
    pub prm: ProtectedResourceMetadata,
}

impl std::fmt::Debug for OAuthServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthServerConfig").field("canonical_url", &self.canonical_url).finish()
    }
}

/// A 401/403 response the transport should send back as-is: status, the
/// `WWW-Authenticate` header value, and a JSON-RPC error body with `id:
/// null` per §6.2.
#[derive(Debug, Clone)]
pub struct UnauthorizedResponse {
    pub status: u16,
    pub www_authenticate: String,
    pub body: Value,
}

/// Outcome of [`authenticate_request`].
#[derive(Debug)]
pub enum AuthOutcome {
    Authenticated(AuthInfo),
    Unauthorized(UnauthorizedResponse),
}

fn resource_metadata_url(config: &OAuthServerConfig) -> String {
    discovery_url(&config.canonical_url).unwrap_or_else(|_| format!("{}/.well-known/oauth-protected-resource", config.canonical_url))
}

fn www_authenticate(config: &OAuthServerConfig, error: &str, scope: Option<&str>) -> String {
    let mut value = format!(r#"Bearer realm="mcp", resource_metadata="{}""#, resource_metadata_url(config));
    if let Some(scope) = scope {
        value.push_str(&format!(r#", scope="{scope}""#));
    }
    value.push_str(&format!(r#", error="{error}""#));
    value
}

fn unauthorized(config: &OAuthServerConfig, error: &str, scope: Option<&str>, status: u16) -> UnauthorizedResponse {
    UnauthorizedResponse {
        status,
        www_authenticate: www_authenticate(config, error, scope),
        body: serde_json::json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": { "code": -32001, "message": format!("{error}: bearer token required") },
        }),
    }
}

/// Extracts the bearer token from `authorization_header` (the request's
/// `Authorization` header value, if present), verifies it via
/// `config.verify_token`, then checks expiry and audience. On any failure
/// this returns a ready-to-send 401, never an error the caller has to
/// translate itself.
pub async fn authenticate_request(authorization_header: Option<&str>, config: &OAuthServerConfig) -> AuthOutcome {
    let Some(header) = authorization_header else {
        return AuthOutcome::Unauthorized(unauthorized(config, "invalid_token", None, 401));
    };
    let Some(token) = header.strip_prefix("Bearer ").map(str::trim) else {
        return AuthOutcome::Unauthorized(unauthorized(config, "invalid_token", None, 401));
    };

    let auth_info = match (config.verify_token)(token.to_string()).await {
        Ok(info) => info,
        Err(_) => return AuthOutcome::Unauthorized(unauthorized(config, "invalid_token", None, 401)),
    };

    if auth_info.is_expired() {
        return AuthOutcome::Unauthorized(unauthorized(config, "invalid_token", None, 401));
    }

    if let Some(audience) = &auth_info.audience {
        if !resource_matches(audience, &config.canonical_url) {
            return AuthOutcome::Unauthorized(unauthorized(config, "invalid_token", None, 401));
        }
    }

    AuthOutcome::Authenticated(auth_info)
}

/// Builds the 403 response for an authenticated request that lacks
/// `required_scope`.
pub fn insufficient_scope(required_scope: &str, config: &OAuthServerConfig) -> UnauthorizedResponse {
    let mut response = unauthorized(config, "insufficient_scope", Some(required_scope), 403);
    response.body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": { "code": -32003, "message": format!("insufficient_scope: requires {required_scope}") },
    });
    response
}

/// Serves the PRM document at `/.well-known/oauth-protected-resource{/path}`.
pub fn protected_resource_metadata(config: &OAuthServerConfig) -> &ProtectedResourceMetadata {
    &config.prm
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(verify: VerifyToken) -> OAuthServerConfig {
        OAuthServerConfig {
            canonical_url: "https://mcp.example.com".to_string(),
            verify_token: verify,
            prm: ProtectedResourceMetadata {
                resource: "https://mcp.example.com".to_string(),
                authorization_servers: vec!["https://as.example.com".to_string()],
                scopes_supported: None,
                bearer_methods_supported: None,
                resource_documentation: None,
            },
        }
    }

    fn auth_info(audience: Option<&str>, scopes: Vec<&str>) -> AuthInfo {
        AuthInfo {
            subject: "user-1".to_string(),
            client_id: None,
            scopes: scopes.into_iter().map(String::from).collect(),
            audience: audience.map(String::from),
            expires_at_unix: None,
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let config = config_with(Arc::new(|_| Box::pin(async { unreachable!() })));
        let outcome = authenticate_request(None, &config).await;
        assert!(matches!(outcome, AuthOutcome::Unauthorized(r) if r.status == 401));
    }

    #[tokio::test]
    async fn valid_token_with_matching_audience_authenticates() {
        let config = config_with(Arc::new(|_token| Box::pin(async { Ok(auth_info(Some("https://mcp.example.com"), vec!["tools:read"])) })));
        let outcome = authenticate_request(Some("Bearer good-token"), &config).await;
        assert!(matches!(outcome, AuthOutcome::Authenticated(_)));
    }

    #[tokio::test]
    async fn audience_mismatch_is_unauthorized() {
        let config = config_with(Arc::new(|_token| Box::pin(async { Ok(auth_info(Some("https://other.example.com"), vec![])) })));
        let outcome = authenticate_request(Some("Bearer token"), &config).await;
        assert!(matches!(outcome, AuthOutcome::Unauthorized(r) if r.status == 401));
    }

    #[tokio::test]
    async fn verify_failure_is_unauthorized() {
        let config = config_with(Arc::new(|_token| Box::pin(async { Err(AuthError::TokenVerification("bad signature".to_string())) })));
        let outcome = authenticate_request(Some("Bearer garbage"), &config).await;
        assert!(matches!(outcome, AuthOutcome::Unauthorized(_)));
    }

    #[test]
    fn insufficient_scope_builds_403_with_scope_challenge() {
        let config = config_with(Arc::new(|_| Box::pin(async { unreachable!() })));
        let response = insufficient_scope("tools:write", &config);
        assert_eq!(response.status, 403);
        assert!(response.www_authenticate.contains(r#"scope="tools:write""#));
    }
}
