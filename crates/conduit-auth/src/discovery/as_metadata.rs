//! Authorization Server Metadata (RFC 8414): the document fetched from the
//! authorization server URL named in Protected Resource Metadata.

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// RFC 8414 §2 Authorization Server Metadata, trimmed to the fields this
/// client subsystem consults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
    #[serde(default)]
    pub grant_types_supported: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
    /// SEP-991 extension: whether the server accepts Client ID Metadata
    /// Document URLs as a `client_id` in place of Dynamic Client
    /// Registration.
    #[serde(default)]
    pub client_id_metadata_document_supported: bool,
}

impl AuthorizationServerMetadata {
    /// Validates the issuer claims itself as `expected_issuer` and that its
    /// endpoints are well-formed absolute URLs.
    pub fn validate(&self, expected_issuer: &str) -> AuthResult<()> {
        if self.issuer.trim_end_matches('/') != expected_issuer.trim_end_matches('/') {
            return Err(AuthError::IssuerMismatch { expected: expected_issuer.to_string(), found: self.issuer.clone() });
        }
        for (name, endpoint) in [
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
        ] {
            url::Url::parse(endpoint).map_err(|e| AuthError::InvalidResourceUri(format!("{name}: {e}")))?;
        }
        Ok(())
    }

    pub fn supports_pkce_s256(&self) -> bool {
        self.code_challenge_methods_supported.iter().any(|m| m == "S256")
    }

    /// `client_secret_basic` when advertised and a secret is configured,
    /// else `client_secret_post`, falling back to the first advertised
    /// method.
    pub fn preferred_token_auth_method(&self, has_secret: bool) -> &'static str {
        let methods = &self.token_endpoint_auth_methods_supported;
        if has_secret && methods.iter().any(|m| m == "client_secret_basic") {
            "client_secret_basic"
        } else if methods.iter().any(|m| m == "client_secret_post") {
            "client_secret_post"
        } else {
            "client_secret_basic"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> AuthorizationServerMetadata {
        AuthorizationServerMetadata {
            issuer: "https://as.example.com".to_string(),
            authorization_endpoint: "https://as.example.com/authorize".to_string(),
            token_endpoint: "https://as.example.com/token".to_string(),
            registration_endpoint: None,
            scopes_supported: None,
            grant_types_supported: vec!["authorization_code".to_string()],
            token_endpoint_auth_methods_supported: vec!["client_secret_post".to_string()],
            code_challenge_methods_supported: vec!["S256".to_string()],
            client_id_metadata_document_supported: false,
        }
    }

    #[test]
    fn validate_accepts_matching_issuer() {
        assert!(metadata().validate("https://as.example.com").is_ok());
    }

    #[test]
    fn validate_rejects_issuer_mismatch() {
        assert!(matches!(metadata().validate("https://other.example.com"), Err(AuthError::IssuerMismatch { .. })));
    }

    #[test]
    fn detects_pkce_support() {
        assert!(metadata().supports_pkce_s256());
        let mut m = metadata();
        m.code_challenge_methods_supported.clear();
        assert!(!m.supports_pkce_s256());
    }

    #[test]
    fn prefers_post_when_basic_not_advertised() {
        assert_eq!(metadata().preferred_token_auth_method(true), "client_secret_post");
    }
}
