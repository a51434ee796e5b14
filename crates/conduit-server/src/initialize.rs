//! The `initialize`/`notifications/initialized` handshake (spec.md §4.1
//! invariant iv: only `ping` and `initialize` are answered before it
//! completes).

use crate::config::ServerConfig;
use crate::registry::{PromptRegistry, ResourceRegistry, ToolRegistry};
use conduit_protocol::initialize::{InitializeParams, InitializeResult};
use conduit_protocol::{ProtocolVersion, ServerCapabilities};
use dashmap::DashMap;

/// Identifies the connection an `initialize` handshake belongs to. `None`
/// for transports (stdio) with exactly one session per process.
pub type SessionKey = Option<String>;

/// Tracks, per session, whether the handshake has completed —
/// `initialize` answered is not enough; the client's
/// `notifications/initialized` must also have arrived.
#[derive(Debug, Default)]
pub struct InitializeState {
    sessions: DashMap<SessionKey, bool>,
}

impl InitializeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `initialize` was answered for `session`; the session is
    /// not yet fully initialized until `notifications/initialized` follows.
    pub fn record_initialize(&self, session: SessionKey) {
        self.sessions.entry(session).or_insert(false);
    }

    /// Records the client's `notifications/initialized`, completing the
    /// handshake for `session`.
    pub fn record_initialized_notification(&self, session: SessionKey) {
        self.sessions.insert(session, true);
    }

    /// Whether `session` has completed the full handshake.
    pub fn is_initialized(&self, session: &SessionKey) -> bool {
        self.sessions.get(session).map(|v| *v).unwrap_or(false)
    }
}

/// Negotiates a protocol version and builds the `initialize` response,
/// deriving which capabilities to advertise from which registries are
/// actually populated rather than from static configuration alone.
pub fn handle(
    config: &ServerConfig,
    tools: &ToolRegistry,
    prompts: &PromptRegistry,
    resources: &ResourceRegistry,
    params: &InitializeParams,
) -> InitializeResult {
    let protocol_version = ProtocolVersion::negotiate(&params.protocol_version);
    InitializeResult {
        protocol_version,
        capabilities: effective_capabilities(config, tools, prompts, resources),
        server_info: config.server_info.clone(),
        instructions: config.instructions.clone(),
    }
}

fn effective_capabilities(
    config: &ServerConfig,
    tools: &ToolRegistry,
    prompts: &PromptRegistry,
    resources: &ResourceRegistry,
) -> ServerCapabilities {
    let mut capabilities = config.capabilities.clone();
    capabilities.tools = if tools.is_empty() { None } else { Some(capabilities.tools.unwrap_or_default()) };
    capabilities.prompts = if prompts.is_empty() { None } else { Some(capabilities.prompts.unwrap_or_default()) };
    capabilities.resources =
        if resources.is_empty() { None } else { Some(capabilities.resources.unwrap_or_default()) };
    capabilities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::JsonSchemaValidator;
    use conduit_protocol::{ClientCapabilities, Implementation};
    use std::sync::Arc;

    #[test]
    fn a_session_is_not_initialized_until_the_notification_arrives() {
        let state = InitializeState::new();
        let session: SessionKey = Some("s1".to_string());
        assert!(!state.is_initialized(&session));
        state.record_initialize(session.clone());
        assert!(!state.is_initialized(&session));
        state.record_initialized_notification(session.clone());
        assert!(state.is_initialized(&session));
    }

    #[test]
    fn capabilities_report_tools_only_once_a_tool_is_registered() {
        let config = ServerConfig::new(Implementation::new("conduit", "0.1.0"));
        let tools = ToolRegistry::new(Arc::new(JsonSchemaValidator::new()));
        let prompts = PromptRegistry::new();
        let resources = ResourceRegistry::new();
        let params = InitializeParams {
            protocol_version: ProtocolVersion::latest(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation::new("client", "0.1.0"),
        };

        let result = handle(&config, &tools, &prompts, &resources, &params);
        assert!(result.capabilities.tools.is_none());

        tools
            .register(
                conduit_protocol::ToolDescriptor {
                    name: "ping".into(),
                    title: None,
                    description: None,
                    input_schema: serde_json::json!({"type": "object"}),
                    output_schema: None,
                },
                std::sync::Arc::new(|_args, _ctx| {
                    Box::pin(async move { Ok(conduit_protocol::tools::CallToolResult::text("pong")) })
                }),
            )
            .unwrap();

        let result = handle(&config, &tools, &prompts, &resources, &params);
        assert!(result.capabilities.tools.is_some());
    }

    #[test]
    fn negotiates_the_clients_offered_version_when_supported() {
        let config = ServerConfig::new(Implementation::new("conduit", "0.1.0"));
        let tools = ToolRegistry::new(Arc::new(JsonSchemaValidator::new()));
        let prompts = PromptRegistry::new();
        let resources = ResourceRegistry::new();
        let params = InitializeParams {
            protocol_version: ProtocolVersion::new(ProtocolVersion::V2024_11_05),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation::new("client", "0.1.0"),
        };
        let result = handle(&config, &tools, &prompts, &resources, &params);
        assert_eq!(result.protocol_version.as_str(), ProtocolVersion::V2024_11_05);
    }
}
