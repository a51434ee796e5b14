//! Protected Resource Metadata (RFC 9728): the document an MCP server
//! serves at `/.well-known/oauth-protected-resource{/path}` pointing a
//! client at its authorization server(s).

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::resource::canonicalize_resource_uri;

/// RFC 9728 §2 Protected Resource Metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtectedResourceMetadata {
    /// REQUIRED. The protected resource's canonical URI.
    pub resource: String,
    /// REQUIRED. At least one authorization server URL; the first is used
    /// (origin-based fallback is rejected as insecure).
    pub authorization_servers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_methods_supported: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_documentation: Option<String>,
}

impl ProtectedResourceMetadata {
    /// Verifies `resource` matches `expected_resource` (canonicalized), and
    /// that there's at least one authorization server to use.
    pub fn validate(&self, expected_resource: &str) -> AuthResult<&str> {
        let found = canonicalize_resource_uri(&self.resource)?;
        let expected = canonicalize_resource_uri(expected_resource)?;
        if found != expected {
            return Err(AuthError::ResourceMismatch { expected, found });
        }
        self.authorization_servers.first().map(String::as_str).ok_or(AuthError::NoAuthorizationServer)
    }
}

/// Builds the discovery path for an MCP server URL, per RFC 9728: the
/// well-known suffix, followed by the server URL's own path if it has one
/// beyond `/`.
pub fn discovery_url(server_url: &str) -> AuthResult<String> {
    let url = url::Url::parse(server_url).map_err(|e| AuthError::InvalidResourceUri(e.to_string()))?;
    let mut base = format!("{}://{}", url.scheme(), url.authority());
    base.push_str("/.well-known/oauth-protected-resource");
    let path = url.path().trim_matches('/');
    if !path.is_empty() {
        base.push('/');
        base.push_str(path);
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prm(resource: &str, servers: Vec<&str>) -> ProtectedResourceMetadata {
        ProtectedResourceMetadata {
            resource: resource.to_string(),
            authorization_servers: servers.into_iter().map(String::from).collect(),
            scopes_supported: None,
            bearer_methods_supported: None,
            resource_documentation: None,
        }
    }

    #[test]
    fn validate_accepts_matching_resource() {
        let metadata = prm("https://mcp.example.com/", vec!["https://as.example.com"]);
        assert_eq!(metadata.validate("https://mcp.example.com").unwrap(), "https://as.example.com");
    }

    #[test]
    fn validate_rejects_resource_mismatch() {
        let metadata = prm("https://other.example.com", vec!["https://as.example.com"]);
        assert!(matches!(metadata.validate("https://mcp.example.com"), Err(AuthError::ResourceMismatch { .. })));
    }

    #[test]
    fn validate_rejects_empty_authorization_servers() {
        let metadata = prm("https://mcp.example.com", vec![]);
        assert!(matches!(metadata.validate("https://mcp.example.com"), Err(AuthError::NoAuthorizationServer)));
    }

    #[test]
    fn discovery_url_appends_path_segment() {
        assert_eq!(discovery_url("https://mcp.example.com/tenant-a").unwrap(), "https://mcp.example.com/.well-known/oauth-protected-resource/tenant-a");
        assert_eq!(discovery_url("https://mcp.example.com").unwrap(), "https://mcp.example.com/.well-known/oauth-protected-resource");
    }
}
