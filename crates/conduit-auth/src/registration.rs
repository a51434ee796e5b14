//! Client registration: Client ID Metadata Documents (SEP-991) when the
//! authorization server supports them and the application configured a
//! metadata URL, else Dynamic Client Registration (RFC 7591).

use serde::{Deserialize, Serialize};

use crate::discovery::AuthorizationServerMetadata;
use crate::error::{AuthError, AuthResult};

/// An already-registered client, or one resolved via CIMD/DCR just before
/// the first authorization request.
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    /// For CIMD this is the metadata document's own HTTPS URL; for DCR or a
    /// pre-provisioned client this is the AS-issued identifier.
    pub client_id: String,
    pub client_secret: Option<String>,
}

/// What the application told the provider about registering itself.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistrationConfig {
    /// A pre-provisioned `client_id`/`client_secret`; when set, no
    /// registration call is made at all.
    pub static_client: Option<RegisteredClient>,
    /// URL of a self-hosted Client ID Metadata Document, used as `client_id`
    /// directly when the AS advertises CIMD support.
    pub cimd_metadata_url: Option<String>,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub software_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct DcrRequest {
    redirect_uris: Vec<String>,
    token_endpoint_auth_method: String,
    grant_types: Vec<String>,
    response_types: Vec<String>,
    client_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    software_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct DcrResponse {
    client_id: String,
    client_secret: Option<String>,
}

/// Resolves the client identity to use for authorization requests against
/// `as_metadata`, performing DCR only when neither a static client nor CIMD
/// applies.
pub async fn resolve_client(
    http: &reqwest::Client,
    as_metadata: &AuthorizationServerMetadata,
    config: &ClientRegistrationConfig,
) -> AuthResult<RegisteredClient> {
    if let Some(client) = &config.static_client {
        return Ok(client.clone());
    }

    if as_metadata.client_id_metadata_document_supported {
        if let Some(url) = &config.cimd_metadata_url {
            return Ok(RegisteredClient { client_id: url.clone(), client_secret: None });
        }
    }

    let Some(registration_endpoint) = &as_metadata.registration_endpoint else {
        return Err(AuthError::Registration("no registration_endpoint advertised and no static client or CIMD URL configured".to_string()));
    };

    let request = DcrRequest {
        redirect_uris: config.redirect_uris.clone(),
        token_endpoint_auth_method: "client_secret_post".to_string(),
        grant_types: vec!["authorization_code".to_string(), "refresh_token".to_string()],
        response_types: vec!["code".to_string()],
        client_name: config.client_name.clone(),
        software_id: config.software_id.clone(),
    };

    let response = http
        .post(registration_endpoint)
        .json(&request)
        .send()
        .await
        .map_err(|e| AuthError::Registration(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Registration(format!("registration endpoint returned {status}: {body}")));
    }

    let registered: DcrResponse = response.json().await.map_err(|e| AuthError::Registration(e.to_string()))?;
    Ok(RegisteredClient { client_id: registered.client_id, client_secret: registered.client_secret })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(registration_endpoint: Option<&str>, cimd: bool) -> AuthorizationServerMetadata {
        AuthorizationServerMetadata {
            issuer: "https://as.example.com".to_string(),
            authorization_endpoint: "https://as.example.com/authorize".to_string(),
            token_endpoint: "https://as.example.com/token".to_string(),
            registration_endpoint: registration_endpoint.map(String::from),
            scopes_supported: None,
            grant_types_supported: vec![],
            token_endpoint_auth_methods_supported: vec![],
            code_challenge_methods_supported: vec![],
            client_id_metadata_document_supported: cimd,
        }
    }

    #[tokio::test]
    async fn static_client_short_circuits_registration() {
        let config = ClientRegistrationConfig {
            static_client: Some(RegisteredClient { client_id: "preconfigured".to_string(), client_secret: Some("secret".to_string()) }),
            ..Default::default()
        };
        let client = resolve_client(&reqwest::Client::new(), &metadata(None, false), &config).await.unwrap();
        assert_eq!(client.client_id, "preconfigured");
    }

    #[tokio::test]
    async fn cimd_url_is_used_as_client_id_when_as_supports_it() {
        let config = ClientRegistrationConfig {
            cimd_metadata_url: Some("https://app.example.com/oauth/client-metadata.json".to_string()),
            ..Default::default()
        };
        let client = resolve_client(&reqwest::Client::new(), &metadata(None, true), &config).await.unwrap();
        assert_eq!(client.client_id, "https://app.example.com/oauth/client-metadata.json");
        assert!(client.client_secret.is_none());
    }

    #[tokio::test]
    async fn cimd_url_is_ignored_when_as_does_not_advertise_support() {
        let config = ClientRegistrationConfig {
            cimd_metadata_url: Some("https://app.example.com/oauth/client-metadata.json".to_string()),
            ..Default::default()
        };
        let err = resolve_client(&reqwest::Client::new(), &metadata(None, false), &config).await.unwrap_err();
        assert!(matches!(err, AuthError::Registration(_)));
    }

    #[tokio::test]
    async fn falls_back_to_dcr_when_registration_endpoint_is_present() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "client_id": "dcr-client-123",
                "client_secret": "dcr-secret",
            })))
            .mount(&server)
            .await;

        let config = ClientRegistrationConfig { client_name: "test client".to_string(), ..Default::default() };
        let client = resolve_client(&reqwest::Client::new(), &metadata(Some(&server.uri()), false), &config).await.unwrap();
        assert_eq!(client.client_id, "dcr-client-123");
        assert_eq!(client.client_secret.as_deref(), Some("dcr-secret"));
    }
}
