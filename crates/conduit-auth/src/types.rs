//! Shared value types: the token set every provider variant caches, and the
//! verified-identity type the server helpers hand to a tool's
//! `handler_context`.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// The window before expiry within which `tokens()` proactively refreshes
/// rather than waiting for a 401.
pub const REFRESH_WINDOW: Duration = Duration::from_secs(60);

/// An access/refresh token pair as returned by a token endpoint, plus the
/// wall-clock instant it expires at.
#[derive(Clone)]
pub struct TokenSet {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub token_type: String,
    pub scope: Option<String>,
    pub expires_at: Option<SystemTime>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl TokenSet {
    pub fn new(access_token: String, expires_in: Option<Duration>) -> Self {
        Self {
            access_token: SecretString::from(access_token),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            scope: None,
            expires_at: expires_in.map(|d| SystemTime::now() + d),
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token.map(SecretString::from);
        self
    }

    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Whether `tokens()` should refresh this set proactively rather than
    /// hand it out as-is.
    pub fn needs_refresh(&self) -> bool {
        match self.expires_at {
            Some(expiry) => match expiry.duration_since(SystemTime::now()) {
                Ok(remaining) => remaining <= REFRESH_WINDOW,
                Err(_) => true,
            },
            None => false,
        }
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|s| s.expose_secret())
    }

    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token())
    }
}

/// The verified identity a server-side `verify_token` callback produces,
/// carried into a tool's `handler_context` as auth info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthInfo {
    pub subject: String,
    pub client_id: Option<String>,
    pub scopes: Vec<String>,
    /// The token's `aud`/`resource` claim, checked against the server's
    /// canonical URL by [`crate::server::authenticate_request`].
    pub audience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at_unix: Option<u64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl AuthInfo {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at_unix {
            Some(exp) => {
                let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
                now >= exp
            }
            None => false,
        }
    }
}

/// A challenge surfaced by a 401/403 response: the `resource_metadata` URL
/// and/or `scope` parsed out of `WWW-Authenticate`.
#[derive(Debug, Clone, Default)]
pub struct UnauthorizedChallenge {
    pub resource_metadata: Option<String>,
    pub scope: Option<String>,
    pub error: Option<String>,
}

impl UnauthorizedChallenge {
    /// Parses a `WWW-Authenticate: Bearer k1="v1", k2="v2"` header value.
    pub fn parse(header: &str) -> Self {
        let mut challenge = Self::default();
        let Some(rest) = header.strip_prefix("Bearer").map(str::trim) else {
            return challenge;
        };
        for part in split_params(rest) {
            let Some((key, value)) = part.split_once('=') else { continue };
            let key = key.trim();
            let value = value.trim().trim_matches('"');
            match key {
                "resource_metadata" => challenge.resource_metadata = Some(value.to_string()),
                "scope" => challenge.scope = Some(value.to_string()),
                "error" => challenge.error = Some(value.to_string()),
                _ => {}
            }
        }
        challenge
    }
}

fn split_params(rest: &str) -> impl Iterator<Item = &str> {
    // Parameter values are quoted strings, so a naive split on ',' would
    // break on a scope list like `scope="a b"`; values here never contain
    // commas so this is safe without a full quoted-string parser.
    rest.split(',').map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_does_not_need_refresh() {
        let set = TokenSet::new("tok".to_string(), Some(Duration::from_secs(3600)));
        assert!(!set.needs_refresh());
    }

    #[test]
    fn token_within_refresh_window_needs_refresh() {
        let set = TokenSet::new("tok".to_string(), Some(Duration::from_secs(30)));
        assert!(set.needs_refresh());
    }

    #[test]
    fn token_without_expiry_never_needs_refresh() {
        let set = TokenSet::new("tok".to_string(), None);
        assert!(!set.needs_refresh());
    }

    #[test]
    fn challenge_parses_resource_metadata_and_scope() {
        let header = r#"Bearer resource_metadata="https://mcp.example.com/.well-known/oauth-protected-resource", scope="tools:write""#;
        let challenge = UnauthorizedChallenge::parse(header);
        assert_eq!(challenge.resource_metadata.as_deref(), Some("https://mcp.example.com/.well-known/oauth-protected-resource"));
        assert_eq!(challenge.scope.as_deref(), Some("tools:write"));
    }

    #[test]
    fn auth_info_detects_missing_scope() {
        let info = AuthInfo {
            subject: "user".to_string(),
            client_id: None,
            scopes: vec!["tools:read".to_string()],
            audience: None,
            expires_at_unix: None,
            extra: HashMap::new(),
        };
        assert!(info.has_scope("tools:read"));
        assert!(!info.has_scope("tools:write"));
    }
}
