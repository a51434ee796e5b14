//! Fetches and caches Protected Resource Metadata and Authorization Server
//! Metadata, per the shared discovery sequence every provider variant runs
//! before its own authorization flow.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::as_metadata::AuthorizationServerMetadata;
use super::prm::{discovery_url, ProtectedResourceMetadata};
use crate::error::{AuthError, AuthResult};

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
}

/// Resolves and caches both halves of OAuth discovery for a set of
/// authorization servers / protected resources, so repeated `tokens()`
/// calls don't refetch metadata that hasn't expired.
pub struct DiscoveryFetcher {
    http: reqwest::Client,
    prm_cache: DashMap<String, CacheEntry<ProtectedResourceMetadata>>,
    as_cache: DashMap<String, CacheEntry<AuthorizationServerMetadata>>,
    ttl: Duration,
}

impl std::fmt::Debug for DiscoveryFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryFetcher").field("ttl", &self.ttl).finish()
    }
}

impl Default for DiscoveryFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryFetcher {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client with static config always builds");
        Self { http, prm_cache: DashMap::new(), as_cache: DashMap::new(), ttl: DEFAULT_CACHE_TTL }
    }

    /// Step 1–2 of discovery: fetch PRM from `explicit_url` (the
    /// `WWW-Authenticate` challenge's `resource_metadata`, when present) or
    /// the well-known suffix on `server_url`, then verify its `resource`
    /// matches `server_url`.
    pub async fn fetch_protected_resource_metadata(
        &self,
        server_url: &str,
        explicit_url: Option<&str>,
    ) -> AuthResult<Arc<ProtectedResourceMetadata>> {
        let url = match explicit_url {
            Some(u) => u.to_string(),
            None => discovery_url(server_url)?,
        };

        if let Some(entry) = self.prm_cache.get(&url) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(Arc::new(entry.value.clone()));
            }
        }

        let metadata: ProtectedResourceMetadata = self.fetch_json(&url).await?;
        metadata.validate(server_url)?;
        self.prm_cache.insert(url, CacheEntry { value: metadata.clone(), fetched_at: Instant::now() });
        Ok(Arc::new(metadata))
    }

    /// Step 4: fetch and validate Authorization Server Metadata from the
    /// first authorization server PRM named.
    pub async fn fetch_authorization_server_metadata(
        &self,
        issuer_url: &str,
    ) -> AuthResult<Arc<AuthorizationServerMetadata>> {
        if let Some(entry) = self.as_cache.get(issuer_url) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(Arc::new(entry.value.clone()));
            }
        }

        let trimmed = issuer_url.trim_end_matches('/');
        let rfc8414_url = format!("{trimmed}/.well-known/oauth-authorization-server");
        let metadata = match self.fetch_json::<AuthorizationServerMetadata>(&rfc8414_url).await {
            Ok(metadata) => metadata,
            Err(_) => {
                let oidc_url = format!("{trimmed}/.well-known/openid-configuration");
                self.fetch_json(&oidc_url).await?
            }
        };
        metadata.validate(issuer_url)?;
        self.as_cache.insert(issuer_url.to_string(), CacheEntry { value: metadata.clone(), fetched_at: Instant::now() });
        Ok(Arc::new(metadata))
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> AuthResult<T> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| AuthError::DiscoveryRequest { url: url.to_string(), source })?;

        if !response.status().is_success() {
            return Err(AuthError::DiscoveryStatus { url: url.to_string(), status: response.status().as_u16() });
        }

        let bytes = response.bytes().await.map_err(|source| AuthError::DiscoveryRequest { url: url.to_string(), source })?;
        if bytes.len() > MAX_RESPONSE_BYTES {
            return Err(AuthError::DiscoveryTooLarge { url: url.to_string(), limit: MAX_RESPONSE_BYTES });
        }
        serde_json::from_slice(&bytes).map_err(|source| AuthError::DiscoveryDecode { url: url.to_string(), source })
    }

    pub fn clear_cache(&self) {
        self.prm_cache.clear();
        self.as_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_and_validates_protected_resource_metadata() {
        let server = MockServer::start().await;
        let resource = server.uri();
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-protected-resource"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resource": resource,
                "authorization_servers": ["https://as.example.com"],
            })))
            .mount(&server)
            .await;

        let fetcher = DiscoveryFetcher::new();
        let metadata = fetcher.fetch_protected_resource_metadata(&resource, None).await.unwrap();
        assert_eq!(metadata.authorization_servers[0], "https://as.example.com");
    }

    #[tokio::test]
    async fn rejects_resource_mismatch_from_server() {
        let server = MockServer::start().await;
        let resource = server.uri();
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-protected-resource"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resource": "https://attacker.example.com",
                "authorization_servers": ["https://as.example.com"],
            })))
            .mount(&server)
            .await;

        let fetcher = DiscoveryFetcher::new();
        let err = fetcher.fetch_protected_resource_metadata(&resource, None).await.unwrap_err();
        assert!(matches!(err, AuthError::ResourceMismatch { .. }));
    }

    #[tokio::test]
    async fn fetches_authorization_server_metadata_via_rfc8414() {
        let server = MockServer::start().await;
        let issuer = server.uri();
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-authorization-server"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{issuer}/authorize"),
                "token_endpoint": format!("{issuer}/token"),
            })))
            .mount(&server)
            .await;

        let fetcher = DiscoveryFetcher::new();
        let metadata = fetcher.fetch_authorization_server_metadata(&issuer).await.unwrap();
        assert_eq!(metadata.issuer, issuer);
    }

    #[tokio::test]
    async fn falls_back_to_oidc_discovery_when_rfc8414_is_absent() {
        let server = MockServer::start().await;
        let issuer = server.uri();
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-authorization-server"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{issuer}/authorize"),
                "token_endpoint": format!("{issuer}/token"),
            })))
            .mount(&server)
            .await;

        let fetcher = DiscoveryFetcher::new();
        let metadata = fetcher.fetch_authorization_server_metadata(&issuer).await.unwrap();
        assert_eq!(metadata.token_endpoint, format!("{issuer}/token"));
    }
}
