//! Origin header validation: DNS-rebinding protection for the streamable
//! HTTP transport's GET/POST/DELETE endpoint.
//!
//! A browser-based attacker who gets a victim to visit a malicious page can
//! point that page's JavaScript at `http://localhost:<port>` and ride the
//! victim's trust of localhost. The `Origin` header is the only signal that
//! survives that attack, so every request is checked against it before
//! reaching the router.

use std::collections::HashSet;
use std::net::IpAddr;

use axum::http::HeaderMap;

const LOCALHOST_ORIGIN_PREFIXES: &[&str] =
    &["http://localhost", "https://localhost", "http://127.0.0.1", "https://127.0.0.1"];

/// Policy for which `Origin` headers a connection may present.
#[derive(Clone, Debug)]
pub struct OriginConfig {
    pub allowed_origins: HashSet<String>,
    pub allow_localhost: bool,
    pub allow_any: bool,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self { allowed_origins: HashSet::new(), allow_localhost: true, allow_any: false }
    }
}

impl OriginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origins.insert(origin.into());
        self
    }

    pub fn allow_localhost(mut self, allow: bool) -> Self {
        self.allow_localhost = allow;
        self
    }

    /// Disables origin checking entirely. Only meant for local development
    /// or test harnesses behind a trusted network boundary.
    pub fn allow_any(mut self, allow: bool) -> Self {
        self.allow_any = allow;
        self
    }
}

/// Rejects a connection whose `Origin` is neither explicitly allowed nor
/// exempt under the localhost/loopback rules below.
///
/// - `allow_any` bypasses every other check.
/// - An `Origin` present and in `allowed_origins`, or matching a localhost
///   prefix when `allow_localhost` is set, is accepted.
/// - A missing `Origin` is accepted only from a loopback client IP: DNS
///   rebinding requires a remote attacker, so a same-machine caller that
///   sends no `Origin` (a CLI, not a browser) carries no rebinding risk.
///   A missing `Origin` from a non-loopback IP is rejected.
pub fn validate_origin(config: &OriginConfig, headers: &HeaderMap, client_ip: IpAddr) -> Result<(), String> {
    if config.allow_any {
        return Ok(());
    }

    match headers.get(axum::http::header::ORIGIN).and_then(|v| v.to_str().ok()) {
        Some(origin) => {
            if config.allowed_origins.contains(origin) {
                return Ok(());
            }
            if config.allow_localhost && LOCALHOST_ORIGIN_PREFIXES.iter().any(|p| origin.starts_with(p)) {
                return Ok(());
            }
            Err(format!("origin '{origin}' is not allowed"))
        }
        None => {
            if client_ip.is_loopback() {
                Ok(())
            } else {
                Err("missing Origin header from a non-loopback client".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_origin(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::ORIGIN, origin.parse().unwrap());
        headers
    }

    #[test]
    fn default_allows_localhost_and_nothing_else() {
        let config = OriginConfig::default();
        assert!(config.allow_localhost);
        assert!(!config.allow_any);
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn localhost_origin_is_allowed() {
        let config = OriginConfig::default();
        let headers = headers_with_origin("http://localhost:3000");
        assert!(validate_origin(&config, &headers, "127.0.0.1".parse().unwrap()).is_ok());
    }

    #[test]
    fn unrecognized_remote_origin_is_rejected() {
        let config = OriginConfig::default();
        let headers = headers_with_origin("http://evil.example");
        assert!(validate_origin(&config, &headers, "192.168.1.100".parse().unwrap()).is_err());
    }

    #[test]
    fn explicitly_configured_origin_is_allowed() {
        let config = OriginConfig::new().add_origin("https://trusted.example").allow_localhost(false);
        let headers = headers_with_origin("https://trusted.example");
        assert!(validate_origin(&config, &headers, "192.168.1.100".parse().unwrap()).is_ok());
    }

    #[test]
    fn missing_origin_from_loopback_is_allowed() {
        let config = OriginConfig::default();
        let headers = HeaderMap::new();
        assert!(validate_origin(&config, &headers, "127.0.0.1".parse().unwrap()).is_ok());
    }

    #[test]
    fn missing_origin_from_remote_is_rejected() {
        let config = OriginConfig::default();
        let headers = HeaderMap::new();
        assert!(validate_origin(&config, &headers, "192.168.1.100".parse().unwrap()).is_err());
    }

    #[test]
    fn allow_any_bypasses_everything() {
        let config = OriginConfig::new().allow_any(true);
        let headers = headers_with_origin("http://anything.example");
        assert!(validate_origin(&config, &headers, "192.168.1.100".parse().unwrap()).is_ok());
    }
}
