//! Method-string dispatch: wires the registries, capability gating, and
//! initialize-state gating together into one entry point a transport calls
//! per inbound envelope (spec.md §4.1).

use crate::completion::CompletionProvider;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler_context::HandlerContext;
use crate::initialize::{self, InitializeState, SessionKey};
use crate::logging::LogLevelSink;
use crate::peer::{NullPeerSink, PeerSink};
use crate::registry::{PromptRegistry, ResourceRegistry, ToolRegistry};
use crate::session_engine::SessionEngine;
use conduit_protocol::envelope::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};
use conduit_protocol::{methods, prompts, resources, tools};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

#[cfg(feature = "tasks")]
use crate::tasks::TaskLedger;

const BATCH_CONCURRENCY: usize = 8;

/// Owns the registries and handshake state for one server instance and
/// dispatches inbound requests and notifications to them.
pub struct Router {
    config: ServerConfig,
    pub tools: ToolRegistry,
    pub prompts: PromptRegistry,
    pub resources: ResourceRegistry,
    initialize_state: InitializeState,
    session_engine: SessionEngine,
    peer: Arc<dyn PeerSink>,
    completion: Option<Arc<dyn CompletionProvider>>,
    log_sink: Option<Arc<dyn LogLevelSink>>,
    #[cfg(feature = "tasks")]
    tasks: TaskLedger,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("config", &self.config).finish()
    }
}

impl Router {
    pub fn new(
        config: ServerConfig,
        tools: ToolRegistry,
        prompts: PromptRegistry,
        resources: ResourceRegistry,
    ) -> Self {
        Self {
            config,
            tools,
            prompts,
            resources,
            initialize_state: InitializeState::new(),
            session_engine: SessionEngine::new(),
            peer: Arc::new(NullPeerSink),
            completion: None,
            log_sink: None,
            #[cfg(feature = "tasks")]
            tasks: TaskLedger::new(),
        }
    }

    pub fn with_peer(mut self, peer: Arc<dyn PeerSink>) -> Self {
        self.peer = peer;
        self
    }

    /// Wires the callback that answers `completion/complete`. Without one,
    /// the method fails with *method-not-found* like any other
    /// unregistered capability.
    pub fn with_completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(provider);
        self
    }

    /// Wires `logging/setLevel` to an actual subscriber (e.g.
    /// [`crate::logging::ReloadLogSink`]). Without one, `setLevel` still
    /// succeeds (the request is acknowledged) but changes nothing.
    pub fn with_log_sink(mut self, sink: Arc<dyn LogLevelSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    #[cfg(feature = "tasks")]
    pub fn tasks(&self) -> &TaskLedger {
        &self.tasks
    }

    pub fn session_engine(&self) -> &SessionEngine {
        &self.session_engine
    }

    fn handler_context(&self, request_id: conduit_protocol::RequestId, session: SessionKey) -> HandlerContext {
        let mut ctx = HandlerContext::new(request_id, conduit_protocol::ClientCapabilities::default())
            .with_capability_mode(self.config.capability_mode)
            .with_peer(Arc::clone(&self.peer));
        if let Some(session) = session {
            ctx = ctx.with_session_id(session);
        }
        ctx
    }

    /// Dispatches one inbound request, enforcing the pre-handshake gate
    /// (only `ping`/`initialize` before `notifications/initialized`) before
    /// routing to a registry or protocol handler.
    pub async fn route(&self, request: JsonRpcRequest, session: SessionKey) -> JsonRpcResponse {
        if !methods::is_pre_initialize_allowed(&request.method) && !self.initialize_state.is_initialized(&session) {
            return to_response(&request, Err(ServerError::NotInitialized));
        }

        let result = self.dispatch(&request, session).await;
        to_response(&request, result)
    }

    /// Dispatches a batch: every member is processed concurrently
    /// (`futures::stream::buffer_unordered`-style), then the responses are
    /// collected back into the order the peer expects.
    pub async fn route_batch(&self, requests: Vec<JsonRpcRequest>, session: SessionKey) -> Vec<JsonRpcResponse> {
        stream::iter(requests.into_iter().map(|request| {
            let session = session.clone();
            async move { self.route(request, session).await }
        }))
        .buffer_unordered(BATCH_CONCURRENCY)
        .collect()
        .await
    }

    /// Handles a fire-and-forget notification: `notifications/initialized`
    /// completes the handshake; `notifications/cancelled` propagates into
    /// whatever in-flight request it names.
    pub fn handle_notification(&self, notification: JsonRpcNotification, session: SessionKey) {
        match notification.method.as_str() {
            methods::NOTIFICATIONS_INITIALIZED => {
                self.initialize_state.record_initialized_notification(session);
            }
            methods::NOTIFICATIONS_CANCELLED => {
                if let Some(params) = notification.params
                    && let Ok(params) =
                        serde_json::from_value::<conduit_protocol::progress::CancelledParams>(params)
                {
                    self.session_engine.cancel_inbound(&params.request_id);
                }
            }
            other => {
                tracing::debug!(method = other, "unhandled notification");
            }
        }
    }

    async fn dispatch(&self, request: &JsonRpcRequest, session: SessionKey) -> ServerResult<serde_json::Value> {
        match request.method.as_str() {
            methods::PING => Ok(serde_json::json!({})),
            methods::INITIALIZE => {
                let params: conduit_protocol::initialize::InitializeParams = parse_params(request)?;
                self.initialize_state.record_initialize(session);
                let result = initialize::handle(&self.config, &self.tools, &self.prompts, &self.resources, &params);
                Ok(serde_json::to_value(result).expect("initialize result always serializes"))
            }

            methods::TOOLS_LIST => {
                let result = tools::ListToolsResult { tools: self.tools.list_enabled(), next_cursor: None };
                Ok(serde_json::to_value(result).expect("list result always serializes"))
            }
            methods::TOOLS_CALL => {
                let params: tools::CallToolParams = parse_params(request)?;
                let ctx = self.handler_context(request.id.clone(), session);
                let token = self.session_engine.begin_inbound(request.id.clone());
                let ctx = ctx.with_cancellation(token);
                let result = self.tools.execute(&params.name, params.arguments, ctx).await;
                self.session_engine.end_inbound(&request.id);
                let result = result?;
                Ok(serde_json::to_value(result).expect("call result always serializes"))
            }

            methods::PROMPTS_LIST => {
                let result = prompts::ListPromptsResult { prompts: self.prompts.list_enabled(), next_cursor: None };
                Ok(serde_json::to_value(result).expect("list result always serializes"))
            }
            methods::PROMPTS_GET => {
                let params: prompts::GetPromptParams = parse_params(request)?;
                let ctx = self.handler_context(request.id.clone(), session);
                let result = self.prompts.execute(&params.name, params.arguments, ctx).await?;
                Ok(serde_json::to_value(result).expect("get result always serializes"))
            }

            methods::RESOURCES_LIST => {
                let result =
                    resources::ListResourcesResult { resources: self.resources.list_enabled(), next_cursor: None };
                Ok(serde_json::to_value(result).expect("list result always serializes"))
            }
            methods::RESOURCES_TEMPLATES_LIST => {
                let result =
                    resources::ListResourceTemplatesResult { resource_templates: self.resources.list_templates() };
                Ok(serde_json::to_value(result).expect("list result always serializes"))
            }
            methods::RESOURCES_READ => {
                let params: resources::ReadResourceParams = parse_params(request)?;
                let ctx = self.handler_context(request.id.clone(), session);
                let result = self.resources.execute(&params.uri, ctx).await?;
                Ok(serde_json::to_value(result).expect("read result always serializes"))
            }
            methods::RESOURCES_SUBSCRIBE => {
                let params: resources::SubscribeParams = parse_params(request)?;
                if !self.resources.has(&params.uri) {
                    return Err(ServerError::ResourceNotFound(params.uri));
                }
                Ok(serde_json::json!({}))
            }
            methods::RESOURCES_UNSUBSCRIBE => {
                let params: resources::UnsubscribeParams = parse_params(request)?;
                if !self.resources.has(&params.uri) {
                    return Err(ServerError::ResourceNotFound(params.uri));
                }
                Ok(serde_json::json!({}))
            }

            methods::COMPLETION_COMPLETE => {
                let provider = self
                    .completion
                    .as_ref()
                    .ok_or_else(|| ServerError::MethodNotFound(methods::COMPLETION_COMPLETE.to_string()))?;
                let params: conduit_protocol::completion::CompleteParams = parse_params(request)?;
                let ctx = self.handler_context(request.id.clone(), session);
                let result = provider.complete(params, ctx).await?;
                Ok(serde_json::to_value(result).expect("completion result always serializes"))
            }

            methods::LOGGING_SET_LEVEL => {
                let params: conduit_protocol::logging::SetLevelParams = parse_params(request)?;
                if let Some(sink) = &self.log_sink {
                    sink.set_level(params.level);
                }
                Ok(serde_json::json!({}))
            }

            #[cfg(feature = "tasks")]
            methods::TASKS_GET => {
                let params: conduit_protocol::tasks::GetTaskParams = parse_params(request)?;
                let result = self
                    .tasks
                    .get(&params.task_id)
                    .ok_or_else(|| ServerError::ResourceNotFound(params.task_id))?;
                Ok(serde_json::to_value(result).expect("task result always serializes"))
            }
            #[cfg(feature = "tasks")]
            methods::TASKS_CANCEL => {
                let params: conduit_protocol::tasks::CancelTaskParams = parse_params(request)?;
                let result = self
                    .tasks
                    .cancel(&params.task_id)
                    .ok_or_else(|| ServerError::ResourceNotFound(params.task_id))?;
                Ok(serde_json::to_value(result).expect("task result always serializes"))
            }

            other => Err(ServerError::MethodNotFound(other.to_string())),
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(request: &JsonRpcRequest) -> ServerResult<T> {
    let params = request.params.clone().unwrap_or(serde_json::Value::Null);
    serde_json::from_value(params)
        .map_err(|e| ServerError::Handler(conduit_protocol::Error::invalid_params(e.to_string())))
}

fn to_response(request: &JsonRpcRequest, result: ServerResult<serde_json::Value>) -> JsonRpcResponse {
    match result {
        Ok(value) => JsonRpcResponse::success(request.id.clone(), value),
        Err(err) => {
            let core: conduit_protocol::Error = err.into();
            JsonRpcResponse::failure(request.id.clone(), JsonRpcError::from(&core))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::JsonSchemaValidator;
    use conduit_protocol::envelope::JsonRpcResponsePayload;

    fn router() -> Router {
        Router::new(
            ServerConfig::new(conduit_protocol::Implementation::new("conduit-server", "0.1.0")),
            ToolRegistry::new(Arc::new(JsonSchemaValidator::new())),
            PromptRegistry::new(),
            ResourceRegistry::new(),
        )
    }

    #[tokio::test]
    async fn ping_is_allowed_before_the_handshake() {
        let router = router();
        let request = JsonRpcRequest::new(1.into(), methods::PING, None);
        let response = router.route(request, None).await;
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn tools_list_is_rejected_before_the_handshake_completes() {
        let router = router();
        let request = JsonRpcRequest::new(1.into(), methods::TOOLS_LIST, None);
        let response = router.route(request, None).await;
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn tools_list_succeeds_once_the_handshake_completes() {
        let router = router();
        initialized(&router).await;

        let request = JsonRpcRequest::new(2.into(), methods::TOOLS_LIST, None);
        let response = router.route(request, None).await;
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let router = router();
        initialized(&router).await;

        let request = JsonRpcRequest::new(2.into(), "nonexistent/method", None);
        let response = router.route(request, None).await;
        match response.payload {
            JsonRpcResponsePayload::Error { error } => assert_eq!(error.code, -32601),
            _ => panic!("expected an error response"),
        }
    }

    async fn initialized(router: &Router) {
        let init_request = JsonRpcRequest::new(
            1.into(),
            methods::INITIALIZE,
            Some(serde_json::json!({
                "protocolVersion": conduit_protocol::ProtocolVersion::latest().as_str(),
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "0.1.0"},
            })),
        );
        router.route(init_request, None).await;
        router.handle_notification(JsonRpcNotification::new(methods::NOTIFICATIONS_INITIALIZED, None), None);
    }

    #[tokio::test]
    async fn resources_templates_list_returns_registered_templates() {
        let router = router();
        router.resources.register_template(conduit_protocol::ResourceTemplateDescriptor {
            uri_template: "file:///{path}".into(),
            name: "file".into(),
            description: None,
            mime_type: None,
        });
        initialized(&router).await;

        let request = JsonRpcRequest::new(2.into(), methods::RESOURCES_TEMPLATES_LIST, None);
        let response = router.route(request, None).await;
        match response.payload {
            JsonRpcResponsePayload::Result { result } => {
                assert_eq!(result["resourceTemplates"].as_array().unwrap().len(), 1);
            }
            _ => panic!("expected a result"),
        }
    }

    #[tokio::test]
    async fn completion_complete_fails_with_method_not_found_when_no_provider_is_wired() {
        let router = router();
        initialized(&router).await;
        let request = JsonRpcRequest::new(
            2.into(),
            methods::COMPLETION_COMPLETE,
            Some(serde_json::json!({
                "ref": {"type": "ref/prompt", "name": "greet"},
                "argument": {"name": "name", "value": "a"},
            })),
        );
        let response = router.route(request, None).await;
        match response.payload {
            JsonRpcResponsePayload::Error { error } => assert_eq!(error.code, -32601),
            _ => panic!("expected an error response"),
        }
    }

    #[tokio::test]
    async fn completion_complete_delegates_to_a_wired_provider() {
        use crate::completion::CompletionProvider;
        use async_trait::async_trait;
        use conduit_protocol::completion::{CompleteParams, CompleteResult, Completion};

        struct StaticProvider;
        #[async_trait]
        impl CompletionProvider for StaticProvider {
            async fn complete(&self, _params: CompleteParams, _ctx: HandlerContext) -> ServerResult<CompleteResult> {
                Ok(CompleteResult { completion: Completion { values: vec!["a".into()], total: None, has_more: None } })
            }
        }

        let router = router().with_completion_provider(Arc::new(StaticProvider));
        initialized(&router).await;
        let request = JsonRpcRequest::new(
            2.into(),
            methods::COMPLETION_COMPLETE,
            Some(serde_json::json!({
                "ref": {"type": "ref/prompt", "name": "greet"},
                "argument": {"name": "name", "value": "a"},
            })),
        );
        let response = router.route(request, None).await;
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn logging_set_level_succeeds_even_without_a_sink_wired() {
        let router = router();
        initialized(&router).await;
        let request =
            JsonRpcRequest::new(2.into(), methods::LOGGING_SET_LEVEL, Some(serde_json::json!({"level": "warning"})));
        let response = router.route(request, None).await;
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn logging_set_level_forwards_to_a_wired_sink() {
        use crate::logging::LogLevelSink;
        use conduit_protocol::logging::LogLevel;
        use std::sync::atomic::{AtomicU8, Ordering};

        struct RecordingSink(AtomicU8);
        impl LogLevelSink for RecordingSink {
            fn set_level(&self, level: LogLevel) {
                self.0.store(level as u8, Ordering::SeqCst);
            }
        }

        let sink = Arc::new(RecordingSink(AtomicU8::new(0)));
        let router = router().with_log_sink(sink.clone());
        initialized(&router).await;
        let request =
            JsonRpcRequest::new(2.into(), methods::LOGGING_SET_LEVEL, Some(serde_json::json!({"level": "error"})));
        router.route(request, None).await;
        assert_eq!(sink.0.load(Ordering::SeqCst), LogLevel::Error as u8);
    }

    #[tokio::test]
    async fn route_batch_preserves_one_response_per_request() {
        let router = router();
        let requests = vec![
            JsonRpcRequest::new(1.into(), methods::PING, None),
            JsonRpcRequest::new(2.into(), methods::PING, None),
        ];
        let responses = router.route_batch(requests, None).await;
        assert_eq!(responses.len(), 2);
    }
}
