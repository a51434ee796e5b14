//! Ties a transport, the session engine, and the handler registry into one
//! bidirectional client endpoint (spec.md §4.1): the `initialize`/
//! `notifications/initialized` handshake, capability-gated outbound calls,
//! batching, cancellation, and a receive loop that demultiplexes replies,
//! server-initiated requests, and notifications off one wire. Mirrors
//! `conduit-server::router::Router`'s dispatch shape for the opposite role.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use conduit_protocol::envelope::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcResponsePayload, JsonRpcSingleMessage, RequestId,
};
use conduit_protocol::initialize::{InitializeParams, InitializeResult};
use conduit_protocol::meta::{ProgressToken, RequestMeta};
use conduit_protocol::progress::{CancelledParams, ProgressParams};
use conduit_protocol::{methods, ProtocolVersion, ServerCapabilities};
use conduit_transport_traits::{Transport, TransportMessage, TransportMessageMetadata};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{CapabilityMode, ClientConfig};
use crate::error::{ClientError, ClientResult};
use crate::handler_registry::HandlerRegistry;
use crate::session_engine::{SessionEngine, TimeoutPolicy};

/// A capability the server must have advertised during `initialize` before
/// an outbound call using it is allowed to proceed (spec.md §4.1
/// "Capability gating").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedCapability {
    Tools,
    Prompts,
    Resources,
    ResourcesSubscribe,
}

/// One outgoing request queued into a batch by [`ClientEndpoint::send_batch`]:
/// its method, params, and timeout policy, exactly as it would be passed to
/// [`ClientEndpoint::send_request`].
pub struct BatchRequest {
    pub method: String,
    pub params: serde_json::Value,
    pub policy: TimeoutPolicy,
}

impl BatchRequest {
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self { method: method.into(), params, policy: TimeoutPolicy::default() }
    }

    pub fn with_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// The client-role MCP session: a transport, the correlation table, and the
/// registry of handlers for whatever the server calls back into. Intended
/// to be held behind an `Arc` — [`ClientEndpoint::connect`] spawns a receive
/// loop that outlives the call.
pub struct ClientEndpoint {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    session_engine: Arc<SessionEngine>,
    handlers: Arc<HandlerRegistry>,
    server_capabilities: RwLock<Option<ServerCapabilities>>,
    server_info: RwLock<Option<conduit_protocol::Implementation>>,
    next_id: AtomicI64,
    initialized: AtomicBool,
    progress_tokens: DashMap<ProgressToken, RequestId>,
    receive_task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ClientEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientEndpoint")
            .field("client_info", &self.config.client_info)
            .field("initialized", &self.initialized.load(Ordering::Relaxed))
            .finish()
    }
}

impl ClientEndpoint {
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Arc<Self> {
        Self::with_handlers(transport, config, Arc::new(HandlerRegistry::new()))
    }

    /// Builds an endpoint sharing an existing [`HandlerRegistry`] rather
    /// than a fresh one — what [`crate::reconnect::ManagedClient`] uses so
    /// handler registrations survive a reconnect even though each
    /// reconnection gets its own transport and [`SessionEngine`].
    pub fn with_handlers(transport: Arc<dyn Transport>, config: ClientConfig, handlers: Arc<HandlerRegistry>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            config,
            session_engine: Arc::new(SessionEngine::new()),
            handlers,
            server_capabilities: RwLock::new(None),
            server_info: RwLock::new(None),
            next_id: AtomicI64::new(1),
            initialized: AtomicBool::new(false),
            progress_tokens: DashMap::new(),
            receive_task: AsyncMutex::new(None),
        })
    }

    pub fn session_engine(&self) -> &SessionEngine {
        &self.session_engine
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.server_capabilities.read().clone()
    }

    pub fn server_info(&self) -> Option<conduit_protocol::Implementation> {
        self.server_info.read().clone()
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Integer(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Connects the underlying transport, starts the receive loop, and runs
    /// the `initialize`/`notifications/initialized` handshake. The returned
    /// `InitializeResult` is also cached for [`ClientEndpoint::server_capabilities`]
    /// and [`ClientEndpoint::server_info`].
    pub async fn connect(self: &Arc<Self>) -> ClientResult<InitializeResult> {
        self.transport.connect().await.map_err(ClientError::Transport)?;
        self.spawn_receive_loop();

        let params = InitializeParams {
            protocol_version: ProtocolVersion::latest(),
            capabilities: self.config.capabilities.clone(),
            client_info: self.config.client_info.clone(),
        };
        let result: InitializeResult = self
            .request_raw(methods::INITIALIZE, serde_json::to_value(params).expect("always serializes"), None, None)
            .await
            .and_then(|value| {
                serde_json::from_value(value)
                    .map_err(|e| ClientError::Internal(format!("malformed initialize result: {e}")))
            })?;

        *self.server_capabilities.write() = Some(result.capabilities.clone());
        *self.server_info.write() = Some(result.server_info.clone());
        self.send_notification(methods::NOTIFICATIONS_INITIALIZED, None).await?;
        self.initialized.store(true, Ordering::Release);
        Ok(result)
    }

    /// Tears the connection down: cancels every pending outbound call, stops
    /// the receive loop, and disconnects the transport. Used directly, or by
    /// a managed wrapper before reconnecting.
    pub async fn disconnect(&self) -> ClientResult<()> {
        self.session_engine.cancel_all_outbound();
        if let Some(handle) = self.receive_task.lock().await.take() {
            handle.abort();
        }
        self.initialized.store(false, Ordering::Release);
        self.transport.disconnect().await.map_err(ClientError::Transport)
    }

    fn spawn_receive_loop(self: &Arc<Self>) {
        let endpoint = Arc::clone(self);
        let handle = tokio::spawn(async move { endpoint.receive_loop().await });
        if let Ok(mut slot) = self.receive_task.try_lock() {
            *slot = Some(handle);
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        loop {
            match self.transport.receive().await {
                Ok(Some(message)) => self.handle_incoming(message).await,
                Ok(None) => {
                    debug!("transport closed, stopping receive loop");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "transport receive failed, stopping receive loop");
                    break;
                }
            }
        }
    }

    async fn handle_incoming(self: &Arc<Self>, message: TransportMessage) {
        match JsonRpcMessage::parse(&message.payload) {
            Ok(JsonRpcMessage::Single(single)) => self.dispatch_single(single).await,
            Ok(JsonRpcMessage::Batch(items)) => {
                for item in items {
                    self.dispatch_single(item).await;
                }
            }
            Err(e) => warn!(error = %e, "failed to parse inbound message"),
        }
    }

    async fn dispatch_single(self: &Arc<Self>, message: JsonRpcSingleMessage) {
        match message {
            JsonRpcSingleMessage::Response(response) => {
                self.session_engine.complete_outbound(&response.id, response);
            }
            JsonRpcSingleMessage::Request(request) => {
                let endpoint = Arc::clone(self);
                tokio::spawn(async move { endpoint.handle_inbound_request(request).await });
            }
            JsonRpcSingleMessage::Notification(notification) => {
                self.handle_notification(notification).await;
            }
        }
    }

    async fn handle_inbound_request(&self, request: JsonRpcRequest) {
        let token = self.session_engine.begin_inbound(request.id.clone());
        let result = tokio::select! {
            result = self.handlers.dispatch_request(&request) => result,
            _ = token.cancelled() => Err(ClientError::Cancelled(request.id.to_string(), "cancelled by server".to_string())),
        };
        self.session_engine.end_inbound(&request.id);

        let response = match result {
            Ok(value) => JsonRpcResponse::success(request.id.clone(), value),
            Err(err) => {
                let core: conduit_core::Error = err.into();
                JsonRpcResponse::failure(request.id.clone(), JsonRpcError::from(&core))
            }
        };
        if let Err(e) = self.send_envelope(&response, Some(response.id.clone())).await {
            warn!(error = %e, "failed to send reply to a server-initiated request");
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            methods::NOTIFICATIONS_PROGRESS => {
                if let Some(params) = notification.params.clone()
                    && let Ok(params) = serde_json::from_value::<ProgressParams>(params)
                    && let Some(id) = self.progress_tokens.get(&params.progress_token)
                {
                    self.session_engine.note_progress(&id);
                }
                self.handlers.dispatch_notification(&notification);
            }
            methods::NOTIFICATIONS_CANCELLED => {
                if let Some(params) = notification.params.clone()
                    && let Ok(params) = serde_json::from_value::<CancelledParams>(params)
                {
                    self.session_engine.cancel_inbound(&params.request_id);
                }
            }
            other => {
                debug!(method = other, "dispatching server notification");
                self.handlers.dispatch_notification(&notification);
            }
        }
    }

    async fn send_envelope(&self, payload: &impl serde::Serialize, id: Option<RequestId>) -> ClientResult<()> {
        let text = serde_json::to_string(payload).expect("envelope always serializes");
        let message = TransportMessage::new(id, text)
            .with_metadata(TransportMessageMetadata::with_content_type("application/json"));
        self.transport.send(message).await.map_err(ClientError::Transport)
    }

    fn gate(&self, capability: GatedCapability) -> ClientResult<()> {
        let caps = self.server_capabilities.read();
        let advertised = match (&*caps, capability) {
            (None, _) => false,
            (Some(c), GatedCapability::Tools) => c.has_tools(),
            (Some(c), GatedCapability::Prompts) => c.has_prompts(),
            (Some(c), GatedCapability::Resources) => c.has_resources(),
            (Some(c), GatedCapability::ResourcesSubscribe) => c.resources_subscribable(),
        };
        if advertised {
            return Ok(());
        }
        let name = match capability {
            GatedCapability::Tools => "tools",
            GatedCapability::Prompts => "prompts",
            GatedCapability::Resources => "resources",
            GatedCapability::ResourcesSubscribe => "resources.subscribe",
        };
        Err(ClientError::CapabilityNotSupported(name.to_string()))
    }

    /// Whether a gated, list-style call should short-circuit to an empty
    /// local result instead of failing or round-tripping, per the
    /// configured [`CapabilityMode`] (spec.md §4.1 "Capability gating").
    pub fn should_skip_unsupported_list(&self, capability: GatedCapability) -> bool {
        self.gate(capability).is_err() && self.config.capability_mode == CapabilityMode::Lenient
    }

    /// Fails locally with *method-not-found* in [`CapabilityMode::Strict`]
    /// when the server never advertised `capability`; a no-op otherwise.
    pub fn require_capability(&self, capability: GatedCapability) -> ClientResult<()> {
        match self.gate(capability) {
            Ok(()) => Ok(()),
            Err(e) if self.config.capability_mode == CapabilityMode::Lenient => {
                let _ = e;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Sends `method` as a request and awaits the server's reply, enforcing
    /// the pre-handshake gate (only `ping`/`initialize` before
    /// `notifications/initialized`, spec.md §4.1 invariant iv).
    pub async fn send_request(
        &self,
        method: &str,
        params: serde_json::Value,
        policy: TimeoutPolicy,
    ) -> ClientResult<serde_json::Value> {
        if !methods::is_pre_initialize_allowed(method) && !self.is_initialized() {
            return Err(ClientError::NotInitialized);
        }
        self.request_raw(method, params, Some(policy), None).await
    }

    /// Like [`ClientEndpoint::send_request`], additionally registering
    /// `progress_token` so inbound `notifications/progress` under that token
    /// reset a `ResetOnProgress` deadline (spec.md §4.1 "Progress").
    pub async fn send_request_with_progress(
        &self,
        method: &str,
        params: serde_json::Value,
        policy: TimeoutPolicy,
        progress_token: ProgressToken,
    ) -> ClientResult<serde_json::Value> {
        if !methods::is_pre_initialize_allowed(method) && !self.is_initialized() {
            return Err(ClientError::NotInitialized);
        }
        self.request_raw(method, params, Some(policy), Some(progress_token)).await
    }

    async fn request_raw(
        &self,
        method: &str,
        mut params: serde_json::Value,
        policy: Option<TimeoutPolicy>,
        progress_token: Option<ProgressToken>,
    ) -> ClientResult<serde_json::Value> {
        let id = self.next_request_id();
        if let Some(token) = progress_token.clone() {
            attach_progress_token(&mut params, token.clone());
            self.progress_tokens.insert(token, id.clone());
        }

        let request = JsonRpcRequest::new(id.clone(), method, Some(params));
        let call = self.session_engine.begin_outbound(id.clone(), policy.unwrap_or_default());
        if let Err(e) = self.send_envelope(&request, Some(id.clone())).await {
            self.session_engine.cancel_outbound(&id);
            if let Some(token) = progress_token {
                self.progress_tokens.remove(&token);
            }
            return Err(e);
        }

        let response = self.session_engine.await_reply(call).await;
        if let Some(token) = progress_token {
            self.progress_tokens.remove(&token);
        }
        if let Err(ClientError::TimedOut(..)) = &response {
            let params = CancelledParams { request_id: id, reason: Some("timeout".to_string()) };
            let _ = self
                .send_notification(
                    methods::NOTIFICATIONS_CANCELLED,
                    Some(serde_json::to_value(params).expect("always serializes")),
                )
                .await;
        }
        match response?.payload {
            JsonRpcResponsePayload::Result { result } => Ok(result),
            JsonRpcResponsePayload::Error { error } => {
                let core: conduit_core::Error = (&error).into();
                Err(ClientError::Protocol(core))
            }
        }
    }

    /// Sends `method` as a fire-and-forget notification.
    pub async fn send_notification(&self, method: &str, params: Option<serde_json::Value>) -> ClientResult<()> {
        let notification = JsonRpcNotification::new(method, params);
        self.send_envelope(&notification, None).await
    }

    /// Cancels a pending outbound request: removes its correlation entry and
    /// tells the server via `notifications/cancelled` (spec.md §4.1
    /// "Cancellation propagation").
    pub async fn cancel(&self, id: RequestId, reason: Option<String>) -> ClientResult<()> {
        self.session_engine.cancel_outbound(&id);
        let params = CancelledParams { request_id: id, reason };
        self.send_notification(
            methods::NOTIFICATIONS_CANCELLED,
            Some(serde_json::to_value(params).expect("always serializes")),
        )
        .await
    }

    /// Submits every member of `requests` as one JSON-RPC batch array,
    /// registering all correlation entries first so responses arriving
    /// interleaved with the write all resolve correctly, then awaits them
    /// concurrently (spec.md §4.1 "Batching").
    pub async fn send_batch(&self, requests: Vec<BatchRequest>) -> Vec<ClientResult<serde_json::Value>> {
        if requests.is_empty() {
            return Vec::new();
        }

        let mut envelopes = Vec::with_capacity(requests.len());
        let mut calls = Vec::with_capacity(requests.len());
        for batch_request in requests {
            let id = self.next_request_id();
            let envelope = JsonRpcRequest::new(id.clone(), batch_request.method, Some(batch_request.params));
            let call = self.session_engine.begin_outbound(id.clone(), batch_request.policy);
            envelopes.push(envelope);
            calls.push(call);
        }

        let batch_text = serde_json::to_string(&envelopes).expect("batch always serializes");
        let message = TransportMessage::new(None, batch_text)
            .with_metadata(TransportMessageMetadata::with_content_type("application/json"));
        if let Err(e) = self.transport.send(message).await {
            let err = ClientError::Transport(e);
            for call in &calls {
                self.session_engine.cancel_outbound(call.id());
            }
            return calls
                .into_iter()
                .map(|_| Err(ClientError::Internal(err.to_string())))
                .collect();
        }

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let response = self.session_engine.await_reply(call).await;
            results.push(match response {
                Ok(response) => match response.payload {
                    JsonRpcResponsePayload::Result { result } => Ok(result),
                    JsonRpcResponsePayload::Error { error } => {
                        let core: conduit_core::Error = (&error).into();
                        Err(ClientError::Protocol(core))
                    }
                },
                Err(e) => Err(e),
            });
        }
        results
    }
}

fn attach_progress_token(params: &mut serde_json::Value, token: ProgressToken) {
    if !params.is_object() {
        *params = serde_json::json!({});
    }
    let meta = RequestMeta::with_progress_token(token);
    params["_meta"] = serde_json::to_value(meta).expect("request meta always serializes");
}
