//! Client-side streamable HTTP transport: a single MCP endpoint handling
//! POST (request/response), GET (server-initiated SSE stream, resumable via
//! `Last-Event-Id`), and DELETE (session termination).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use conduit_protocol::RequestId;
use conduit_transport_streamable::SseParser;
use conduit_transport_traits::{
    validate_request_size, validate_response_size, BidirectionalTransport, LimitsConfig, Transport,
    TransportCapabilities, TransportError, TransportMessage, TransportMessageMetadata, TransportResult,
    TransportState, TransportType,
};
use futures::StreamExt;
use reqwest::{header, Client as HttpClient, StatusCode};
use tokio::sync::{mpsc, Mutex as TokioMutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::auth::TokenSource;
use crate::config::StreamableHttpClientConfig;

const SSE_QUEUE_CAPACITY: usize = 1000;
const RESPONSE_QUEUE_CAPACITY: usize = 100;

/// Client-side streamable HTTP transport.
pub struct StreamableHttpClientTransport {
    config: StreamableHttpClientConfig,
    http_client: HttpClient,
    state: Arc<RwLock<TransportState>>,
    capabilities: TransportCapabilities,
    token_source: Option<Arc<dyn TokenSource>>,

    session_id: Arc<RwLock<Option<String>>>,
    last_event_id: Arc<RwLock<Option<String>>>,

    /// Server-initiated messages delivered over the GET/SSE stream.
    sse_receiver: Arc<TokioMutex<mpsc::Receiver<TransportMessage>>>,
    sse_sender: mpsc::Sender<TransportMessage>,

    /// Extra messages surfaced inside a POST's SSE response beyond the one
    /// matching the outgoing request id (e.g. a nested server-to-client
    /// request).
    response_receiver: Arc<TokioMutex<mpsc::Receiver<TransportMessage>>>,
    response_sender: mpsc::Sender<TransportMessage>,

    sse_task: Arc<TokioMutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl std::fmt::Debug for StreamableHttpClientTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamableHttpClientTransport")
            .field("base_url", &self.config.base_url)
            .field("endpoint_path", &self.config.endpoint_path)
            .finish()
    }
}

impl StreamableHttpClientTransport {
    pub fn new(config: StreamableHttpClientConfig) -> Self {
        let (sse_tx, sse_rx) = mpsc::channel(SSE_QUEUE_CAPACITY);
        let (response_tx, response_rx) = mpsc::channel(RESPONSE_QUEUE_CAPACITY);

        let mut builder = HttpClient::builder().timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        let http_client = builder.build().expect("failed to build HTTP client");

        Self {
            config,
            http_client,
            state: Arc::new(RwLock::new(TransportState::Disconnected)),
            capabilities: TransportCapabilities {
                max_message_size: Some(10 * 1024 * 1024),
                supports_streaming: true,
                supports_resumability: true,
                supports_sessions: true,
                custom: Default::default(),
            },
            token_source: None,
            session_id: Arc::new(RwLock::new(None)),
            last_event_id: Arc::new(RwLock::new(None)),
            sse_receiver: Arc::new(TokioMutex::new(sse_rx)),
            sse_sender: sse_tx,
            response_receiver: Arc::new(TokioMutex::new(response_rx)),
            response_sender: response_tx,
            sse_task: Arc::new(TokioMutex::new(None)),
        }
    }

    /// Attaches a token source; its token is sent as a bearer `Authorization`
    /// header and `refresh()` is invoked once on a `401`/`403` before a
    /// single retry.
    pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    fn endpoint_url(&self) -> String {
        format!("{}{}", self.config.base_url, self.config.endpoint_path)
    }

    async fn build_headers(&self, accept: &str) -> TransportResult<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_str(accept)
                .map_err(|e| TransportError::ConfigurationError(e.to_string()))?,
        );
        headers.insert(
            "MCP-Protocol-Version",
            header::HeaderValue::from_str(&self.config.protocol_version)
                .map_err(|e| TransportError::ConfigurationError(e.to_string()))?,
        );

        if let Some(session_id) = self.session_id.read().await.as_ref() {
            if let Ok(value) = header::HeaderValue::from_str(session_id) {
                headers.insert("Mcp-Session-Id", value);
            }
        }
        if let Some(last_event_id) = self.last_event_id.read().await.as_ref() {
            if let Ok(value) = header::HeaderValue::from_str(last_event_id) {
                headers.insert("Last-Event-ID", value);
            }
        }

        let bearer = match &self.token_source {
            Some(source) => source.token().await,
            None => self.config.auth_token.clone(),
        };
        if let Some(token) = bearer {
            if let Ok(value) = header::HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(header::AUTHORIZATION, value);
            }
        }

        for (key, value) in &self.config.headers {
            if let (Ok(name), Ok(value)) =
                (header::HeaderName::from_bytes(key.as_bytes()), header::HeaderValue::from_str(value))
            {
                headers.insert(name, value);
            }
        }

        Ok(headers)
    }

    async fn adopt_session_id(&self, response: &reqwest::Response) {
        if let Some(id) = response.headers().get("Mcp-Session-Id").and_then(|v| v.to_str().ok()) {
            *self.session_id.write().await = Some(id.to_string());
        }
    }

    /// One POST to the MCP endpoint, retried once after `refresh()` on a
    /// `401`/`403` if a [`TokenSource`] is attached.
    async fn post(&self, body: &str) -> TransportResult<reqwest::Response> {
        validate_request_size(body.len(), &self.config.limits)?;

        let headers = self.build_headers("application/json, text/event-stream").await?;
        let response = self
            .http_client
            .post(self.endpoint_url())
            .headers(headers)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            if let Some(source) = &self.token_source {
                debug!(status = %response.status(), "refreshing bearer token and retrying once");
                source.refresh().await;
                let headers = self.build_headers("application/json, text/event-stream").await?;
                return self
                    .http_client
                    .post(self.endpoint_url())
                    .headers(headers)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(body.to_string())
                    .send()
                    .await
                    .map_err(|e| TransportError::ConnectionFailed(e.to_string()));
            }
        }
        Ok(response)
    }

    async fn start_sse_stream(&self) -> TransportResult<()> {
        let endpoint_url = self.endpoint_url();
        let config = self.config.clone();
        let http_client = self.http_client.clone();
        let state = Arc::clone(&self.state);
        let sse_sender = self.sse_sender.clone();
        let session_id = Arc::clone(&self.session_id);
        let last_event_id = Arc::clone(&self.last_event_id);
        let token_source = self.token_source.clone();
        let limits = self.config.limits.clone();

        let task = tokio::spawn(async move {
            sse_reconnect_loop(endpoint_url, config, http_client, state, sse_sender, session_id, last_event_id, token_source, limits)
                .await;
        });
        *self.sse_task.lock().await = Some(task);
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn sse_reconnect_loop(
    endpoint_url: String,
    config: StreamableHttpClientConfig,
    http_client: HttpClient,
    state: Arc<RwLock<TransportState>>,
    sse_sender: mpsc::Sender<TransportMessage>,
    session_id: Arc<RwLock<Option<String>>>,
    last_event_id: Arc<RwLock<Option<String>>>,
    token_source: Option<Arc<dyn TokenSource>>,
    limits: LimitsConfig,
) {
    let mut attempt = 0u32;
    loop {
        match config.retry_policy.delay(attempt) {
            Some(delay) if attempt > 0 => {
                warn!(?delay, attempt, "reconnecting SSE stream");
                tokio::time::sleep(delay).await;
            }
            Some(_) => {}
            None => {
                error!("SSE stream gave up reconnecting");
                *state.write().await = TransportState::Disconnected;
                return;
            }
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("text/event-stream"));
        if let Ok(value) = header::HeaderValue::from_str(&config.protocol_version) {
            headers.insert("MCP-Protocol-Version", value);
        }
        if let Some(sid) = session_id.read().await.as_ref() {
            if let Ok(value) = header::HeaderValue::from_str(sid) {
                headers.insert("Mcp-Session-Id", value);
            }
        }
        if let Some(last_id) = last_event_id.read().await.as_ref() {
            if let Ok(value) = header::HeaderValue::from_str(last_id) {
                headers.insert("Last-Event-ID", value);
            }
        }
        let bearer = match &token_source {
            Some(source) => source.token().await,
            None => config.auth_token.clone(),
        };
        if let Some(token) = bearer {
            if let Ok(value) = header::HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(header::AUTHORIZATION, value);
            }
        }

        match http_client.get(&endpoint_url).headers(headers).send().await {
            Ok(response) if response.status().is_success() => {
                if let Some(sid) = response.headers().get("Mcp-Session-Id").and_then(|v| v.to_str().ok()) {
                    *session_id.write().await = Some(sid.to_string());
                }
                info!("SSE stream connected");
                *state.write().await = TransportState::Connected;
                attempt = 0;

                let mut parser = SseParser::new();
                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    let chunk = match chunk {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            warn!(error = %e, "SSE stream read error");
                            break;
                        }
                    };
                    if validate_response_size(chunk.len(), &limits).is_err() {
                        warn!("SSE chunk exceeded response size limit, dropping connection");
                        break;
                    }
                    let text = String::from_utf8_lossy(&chunk);
                    for event in parser.feed(&text) {
                        if let Some(id) = &event.id {
                            *last_event_id.write().await = Some(id.clone());
                        }
                        if event.data.is_empty() {
                            continue;
                        }
                        let message = TransportMessage::new(extract_id(&event.data), event.data.clone())
                            .with_metadata(TransportMessageMetadata::with_content_type("application/json"));
                        if sse_sender.send(message).await.is_err() {
                            return;
                        }
                    }
                }
                warn!("SSE stream ended");
                *state.write().await = TransportState::Disconnected;
            }
            Ok(response) => {
                error!(status = %response.status(), "SSE stream connection rejected");
                attempt += 1;
            }
            Err(e) => {
                error!(error = %e, "failed to open SSE stream");
                attempt += 1;
            }
        }
    }
}

/// Pulls `id` out of a raw JSON-RPC payload, if present — used to route a
/// frame either to the pending request it answers or to the general
/// server-initiated inbox.
fn extract_id(payload: &str) -> Option<RequestId> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    let id = value.get("id")?;
    serde_json::from_value(id.clone()).ok()
}

impl Transport for StreamableHttpClientTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::StreamableHttp
    }

    fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move { self.state.read().await.clone() })
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            info!(endpoint = %self.endpoint_url(), "connecting streamable HTTP transport");
            *self.state.write().await = TransportState::Connecting;
            self.start_sse_stream().await?;
            // Give the stream a moment to establish before reporting connected;
            // POST requests don't depend on it, so this isn't load-bearing.
            tokio::time::sleep(Duration::from_millis(50)).await;
            *self.state.write().await = TransportState::Connected;
            Ok(())
        })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            *self.state.write().await = TransportState::Disconnecting;
            if let Some(handle) = self.sse_task.lock().await.take() {
                handle.abort();
            }
            if let Some(session_id) = self.session_id.read().await.as_ref() {
                let mut headers = header::HeaderMap::new();
                if let Ok(value) = header::HeaderValue::from_str(session_id) {
                    headers.insert("Mcp-Session-Id", value);
                }
                let _ = self.http_client.delete(self.endpoint_url()).headers(headers).send().await;
            }
            *self.state.write().await = TransportState::Disconnected;
            Ok(())
        })
    }

    fn send(
        &self,
        message: TransportMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let response = self.post(&message.payload).await?;
            if !response.status().is_success() {
                return Err(TransportError::ConnectionFailed(format!("POST failed: {}", response.status())));
            }
            self.adopt_session_id(&response).await;
            // A notification or response the client sent gets a bare 202; any
            // body (rare, but legal) is salvaged into the SSE inbox rather
            // than dropped.
            if response.status() == StatusCode::ACCEPTED {
                return Ok(());
            }
            let body = response.bytes().await.map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            if body.is_empty() {
                return Ok(());
            }
            validate_response_size(body.len(), &self.config.limits)?;
            let text = String::from_utf8_lossy(&body).to_string();
            let message = TransportMessage::new(extract_id(&text), text);
            let _ = self.sse_sender.send(message).await;
            Ok(())
        })
    }

    fn receive(
        &self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
        Box::pin(async move {
            {
                let mut response_receiver = self.response_receiver.lock().await;
                match response_receiver.try_recv() {
                    Ok(message) => return Ok(Some(message)),
                    Err(mpsc::error::TryRecvError::Empty) => {}
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        return Err(TransportError::ConnectionLost("response channel disconnected".into()));
                    }
                }
            }
            let mut sse_receiver = self.sse_receiver.lock().await;
            match sse_receiver.recv().await {
                Some(message) => Ok(Some(message)),
                None => Err(TransportError::ConnectionLost("SSE channel disconnected".into())),
            }
        })
    }

    fn endpoint(&self) -> Option<String> {
        Some(self.endpoint_url())
    }
}

impl BidirectionalTransport for StreamableHttpClientTransport {
    fn send_request(
        &self,
        message: TransportMessage,
        timeout: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = TransportResult<TransportMessage>> + Send + '_>> {
        Box::pin(async move {
            let request_id = message.id.clone();
            let call = self.post_and_correlate(&message.payload, request_id);
            match timeout {
                Some(duration) => tokio::time::timeout(duration, call).await.map_err(|_| {
                    TransportError::RequestTimeout { operation: "streamable-http send_request".into(), timeout: duration }
                })?,
                None => call.await,
            }
        })
    }
}

impl StreamableHttpClientTransport {
    /// POSTs `payload` and returns the reply matching `expected_id`. If the
    /// server answered with an SSE stream, any other frame it carries
    /// (e.g. a server-to-client request nested in the same response) is
    /// queued for [`Transport::receive`] instead of being discarded.
    async fn post_and_correlate(
        &self,
        payload: &str,
        expected_id: Option<RequestId>,
    ) -> TransportResult<TransportMessage> {
        let response = self.post(payload).await?;
        if !response.status().is_success() {
            return Err(TransportError::ConnectionFailed(format!("POST failed: {}", response.status())));
        }
        self.adopt_session_id(&response).await;

        if response.status() == StatusCode::ACCEPTED {
            return Err(TransportError::ProtocolError(
                "server accepted the request without a reply (202)".into(),
            ));
        }

        let content_type =
            response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("").to_string();

        if content_type.contains("application/json") {
            let body = response.bytes().await.map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            validate_response_size(body.len(), &self.config.limits)?;
            let text = String::from_utf8_lossy(&body).to_string();
            return Ok(TransportMessage::new(extract_id(&text), text)
                .with_metadata(TransportMessageMetadata::with_content_type("application/json")));
        }

        if content_type.contains("text/event-stream") {
            let mut parser = SseParser::new();
            let mut stream = response.bytes_stream();
            let mut matched: Option<TransportMessage> = None;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
                validate_response_size(chunk.len(), &self.config.limits)?;
                let text = String::from_utf8_lossy(&chunk);
                for event in parser.feed(&text) {
                    if let Some(id) = &event.id {
                        *self.last_event_id.write().await = Some(id.clone());
                    }
                    if event.data.is_empty() {
                        continue;
                    }
                    let id = extract_id(&event.data);
                    let frame = TransportMessage::new(id.clone(), event.data.clone());
                    if matched.is_none() && id == expected_id {
                        matched = Some(frame);
                    } else {
                        let _ = self.response_sender.send(frame).await;
                    }
                }
            }
            return matched
                .ok_or_else(|| TransportError::ProtocolError("SSE stream ended without a matching reply".into()));
        }

        Err(TransportError::ProtocolError(format!("unsupported response content type: {content_type}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_id_reads_the_id_field() {
        let id = extract_id(r#"{"jsonrpc":"2.0","id":7,"result":{}}"#);
        assert_eq!(id, Some(RequestId::Integer(7)));
    }

    #[test]
    fn extract_id_is_none_for_a_notification() {
        let id = extract_id(r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#);
        assert!(id.is_none());
    }

    #[tokio::test]
    async fn new_transport_starts_disconnected() {
        let transport = StreamableHttpClientTransport::new(StreamableHttpClientConfig::default());
        assert_eq!(transport.state().await, TransportState::Disconnected);
        assert_eq!(transport.transport_type(), TransportType::StreamableHttp);
        assert!(transport.capabilities().supports_resumability);
    }

    #[tokio::test]
    async fn token_source_overrides_the_static_auth_token() {
        use crate::auth::StaticToken;
        let config = StreamableHttpClientConfig { auth_token: Some("stale".into()), ..Default::default() };
        let transport = StreamableHttpClientTransport::new(config)
            .with_token_source(Arc::new(StaticToken::new("fresh")));
        let headers = transport.build_headers("application/json").await.unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer fresh");
    }
}
