//! The context passed to every tool/prompt/resource handler invocation
//! (spec.md §4.6 step 4): request identity, negotiated capabilities, auth,
//! cancellation, and the peer-call handles (`elicit`,
//! `create_sampling_message`, `list_roots`).

use crate::config::CapabilityMode;
use crate::error::{ServerError, ServerResult};
use crate::peer::{NullPeerSink, PeerSink};
use conduit_protocol::elicitation::{ElicitationCreateParams, ElicitationCreateResult};
use conduit_protocol::envelope::{JsonRpcNotification, JsonRpcRequest, RequestId};
use conduit_protocol::logging::LogLevel;
use conduit_protocol::meta::ProgressToken;
use conduit_protocol::progress::ProgressParams;
use conduit_protocol::roots::ListRootsResult;
use conduit_protocol::sampling::{CreateMessageParams, CreateMessageResult};
use conduit_protocol::ClientCapabilities;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Identity and scope an authenticated request carries, populated by the
/// transport from `conduit-auth`'s bearer-token verifier. With the `auth`
/// feature enabled this is `conduit_auth::types::AuthInfo` itself, so a
/// verified token's subject/scopes/audience/expiry flow straight into
/// handler context with no translation layer; without it (no OAuth wired
/// in) a minimal stand-in carries just subject and scopes.
#[cfg(feature = "auth")]
pub use conduit_auth::AuthInfo;

#[cfg(not(feature = "auth"))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthInfo {
    pub subject: Option<String>,
    pub scopes: Vec<String>,
}

#[cfg(not(feature = "auth"))]
impl AuthInfo {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

#[derive(Clone)]
pub struct HandlerContext {
    pub request_id: RequestId,
    pub session_id: Option<String>,
    pub client_capabilities: ClientCapabilities,
    pub auth: Option<AuthInfo>,
    pub related_task_id: Option<String>,
    capability_mode: CapabilityMode,
    cancellation: CancellationToken,
    progress_token: Option<ProgressToken>,
    peer: Arc<dyn PeerSink>,
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("request_id", &self.request_id)
            .field("session_id", &self.session_id)
            .field("related_task_id", &self.related_task_id)
            .finish()
    }
}

impl HandlerContext {
    pub fn new(request_id: RequestId, client_capabilities: ClientCapabilities) -> Self {
        Self {
            request_id,
            session_id: None,
            client_capabilities,
            auth: None,
            related_task_id: None,
            capability_mode: CapabilityMode::default(),
            cancellation: CancellationToken::new(),
            progress_token: None,
            peer: Arc::new(NullPeerSink),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_auth(mut self, auth: AuthInfo) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_related_task_id(mut self, id: impl Into<String>) -> Self {
        self.related_task_id = Some(id.into());
        self
    }

    pub fn with_capability_mode(mut self, mode: CapabilityMode) -> Self {
        self.capability_mode = mode;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_progress_token(mut self, token: Option<ProgressToken>) -> Self {
        self.progress_token = token;
        self
    }

    pub fn with_peer(mut self, peer: Arc<dyn PeerSink>) -> Self {
        self.peer = peer;
        self
    }

    /// Whether the in-flight request behind this context has been
    /// cancelled (either by the peer's `notifications/cancelled` or by
    /// engine shutdown).
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the request is cancelled; handlers that can check in
    /// periodically should race this against their own work.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// Emits `notifications/progress` if the inbound request carried a
    /// progress token; a no-op otherwise.
    pub async fn emit_progress(&self, progress: f64, total: Option<f64>, message: Option<String>) {
        let Some(token) = self.progress_token.clone() else { return };
        let params = ProgressParams { progress_token: token, progress, total, message };
        let notification = JsonRpcNotification::new(
            conduit_protocol::methods::NOTIFICATIONS_PROGRESS,
            Some(serde_json::to_value(params).expect("progress params always serialize")),
        );
        self.peer.notify(notification).await;
    }

    /// Emits `notifications/message` (a logging message) to the peer.
    pub async fn emit_log(&self, level: LogLevel, logger: Option<String>, data: serde_json::Value) {
        let params = conduit_protocol::logging::LoggingMessageParams { level, logger, data };
        let notification = JsonRpcNotification::new(
            conduit_protocol::methods::NOTIFICATIONS_MESSAGE,
            Some(serde_json::to_value(params).expect("logging params always serialize")),
        );
        self.peer.notify(notification).await;
    }

    fn gate(&self, feature: &str, supported: bool) -> ServerResult<bool> {
        if supported {
            return Ok(true);
        }
        match self.capability_mode {
            CapabilityMode::Strict => Err(ServerError::CapabilityNotSupported(feature.to_string())),
            CapabilityMode::Lenient => Ok(false),
        }
    }

    /// Server-initiated `elicitation/create`. Gated on the client's
    /// negotiated `elicitation` capability.
    pub async fn elicit(&self, params: ElicitationCreateParams) -> ServerResult<ElicitationCreateResult> {
        self.gate("elicitation", self.client_capabilities.has_elicitation())?;
        let request = JsonRpcRequest::new(
            self.request_id.clone(),
            conduit_protocol::methods::ELICITATION_CREATE,
            Some(serde_json::to_value(params).expect("elicitation params always serialize")),
        );
        let response = self.peer.request(request, Some(Duration::from_secs(60))).await?;
        decode_result(response)
    }

    /// Server-initiated `sampling/createMessage`. Gated on the client's
    /// negotiated `sampling` capability.
    pub async fn create_sampling_message(
        &self,
        params: CreateMessageParams,
    ) -> ServerResult<CreateMessageResult> {
        self.gate("sampling", self.client_capabilities.has_sampling())?;
        let request = JsonRpcRequest::new(
            self.request_id.clone(),
            conduit_protocol::methods::SAMPLING_CREATE_MESSAGE,
            Some(serde_json::to_value(params).expect("sampling params always serialize")),
        );
        let response = self.peer.request(request, None).await?;
        decode_result(response)
    }

    /// Server-initiated `roots/list`. In lenient mode, a client that never
    /// advertised `roots` gets an empty list without a round trip
    /// (spec.md §4.1 "Capability gating").
    pub async fn list_roots(&self) -> ServerResult<ListRootsResult> {
        if !self.gate("roots", self.client_capabilities.has_roots())? {
            return Ok(ListRootsResult { roots: Vec::new() });
        }
        let request =
            JsonRpcRequest::new(self.request_id.clone(), conduit_protocol::methods::ROOTS_LIST, None);
        let response = self.peer.request(request, None).await?;
        decode_result(response)
    }
}

fn decode_result<T: serde::de::DeserializeOwned>(response: conduit_protocol::envelope::JsonRpcResponse) -> ServerResult<T> {
    use conduit_protocol::envelope::JsonRpcResponsePayload;
    match response.payload {
        JsonRpcResponsePayload::Result { result } => serde_json::from_value(result)
            .map_err(|e| ServerError::Internal(format!("peer response did not match expected shape: {e}"))),
        JsonRpcResponsePayload::Error { error } => Err(ServerError::Internal(error.message)),
    }
}
