//! RFC 8707 resource indicator: canonicalizing the MCP server's URL for use
//! as the `resource` parameter on every authorization and token request, and
//! for matching against Protected Resource Metadata's `resource` field.

use url::Url;

use crate::error::{AuthError, AuthResult};

/// Canonicalizes `uri` per RFC 8707 §2: lowercase scheme and host, default
/// ports stripped, fragment rejected, trailing slash trimmed (except for the
/// bare root path).
pub fn canonicalize_resource_uri(uri: &str) -> AuthResult<String> {
    let url = Url::parse(uri).map_err(|e| AuthError::InvalidResourceUri(e.to_string()))?;

    let scheme = url.scheme().to_lowercase();
    if scheme != "https" && scheme != "http" {
        return Err(AuthError::InvalidResourceUri(format!("unsupported scheme: {scheme}")));
    }
    if url.fragment().is_some() {
        return Err(AuthError::InvalidResourceUri("resource URI must not contain a fragment".to_string()));
    }
    let host = url.host_str().ok_or_else(|| AuthError::InvalidResourceUri("resource URI must have a host".to_string()))?;

    let port_part = match url.port() {
        Some(port) if !((scheme == "https" && port == 443) || (scheme == "http" && port == 80)) => format!(":{port}"),
        _ => String::new(),
    };

    let path = url.path();
    let path = if path == "/" { "/" } else { path.trim_end_matches('/') };

    Ok(format!("{scheme}://{}{port_part}{path}", host.to_lowercase()))
}

/// Whether two resource URIs denote the same canonical resource, per RFC
/// 8707's normalization rules.
pub fn resource_matches(a: &str, b: &str) -> bool {
    match (canonicalize_resource_uri(a), canonicalize_resource_uri(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_scheme_and_host_case() {
        assert_eq!(canonicalize_resource_uri("HTTPS://API.Example.com/mcp").unwrap(), "https://api.example.com/mcp");
    }

    #[test]
    fn strips_default_port_but_keeps_nondefault() {
        assert_eq!(canonicalize_resource_uri("https://api.example.com:443/mcp").unwrap(), "https://api.example.com/mcp");
        assert_eq!(canonicalize_resource_uri("https://api.example.com:8443/mcp").unwrap(), "https://api.example.com:8443/mcp");
    }

    #[test]
    fn trims_trailing_slash_except_root() {
        assert_eq!(canonicalize_resource_uri("https://api.example.com/mcp/").unwrap(), "https://api.example.com/mcp");
        assert_eq!(canonicalize_resource_uri("https://api.example.com/").unwrap(), "https://api.example.com/");
    }

    #[test]
    fn rejects_fragment() {
        assert!(canonicalize_resource_uri("https://api.example.com/mcp#frag").is_err());
    }

    #[test]
    fn resource_matches_is_normalization_aware() {
        assert!(resource_matches("https://API.example.com:443/mcp/", "https://api.example.com/mcp"));
        assert!(!resource_matches("https://api.example.com/mcp", "https://api.example.com/other"));
    }
}
