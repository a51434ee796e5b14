//! Typed convenience methods over [`ClientEndpoint`]: the handful of calls
//! an application actually makes (`tools/list`, `tools/call`, `prompts/*`,
//! `resources/*`, `ping`, `completion/complete`, `logging/setLevel`),
//! wrapping the raw `send_request` plumbing with capability gating, typed
//! params/results, and — for `tools/call` — the client-side output-schema
//! mirror (spec.md §4.6 step 6).

use std::sync::Arc;

use conduit_protocol::completion::{CompleteParams, CompleteResult};
use conduit_protocol::logging::{LogLevel, SetLevelParams};
use conduit_protocol::prompts::{GetPromptParams, GetPromptResult, ListPromptsResult};
use conduit_protocol::resources::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceParams, ReadResourceResult, SubscribeParams,
    UnsubscribeParams,
};
use conduit_protocol::tools::{CallToolParams, CallToolResult, ListToolsResult};
use conduit_protocol::{methods, ToolDescriptor};

use crate::endpoint::{ClientEndpoint, GatedCapability};
use crate::error::{ClientError, ClientResult};
use crate::session_engine::TimeoutPolicy;
use crate::validator::OutputSchemaCache;

fn from_json<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> ClientResult<T> {
    serde_json::from_value(value).map_err(|e| ClientError::Internal(format!("malformed server response: {e}")))
}

/// A ready-to-use MCP client built on a connected [`ClientEndpoint`].
/// Caches the output schema of every tool seen via `list_tools` so
/// `call_tool` can validate `structuredContent` without a second
/// round-trip.
pub struct Client {
    endpoint: Arc<ClientEndpoint>,
    output_schemas: OutputSchemaCache,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("endpoint", &self.endpoint).finish()
    }
}

impl Client {
    pub fn new(endpoint: Arc<ClientEndpoint>) -> Self {
        Self { endpoint, output_schemas: OutputSchemaCache::new() }
    }

    pub fn endpoint(&self) -> &Arc<ClientEndpoint> {
        &self.endpoint
    }

    pub async fn ping(&self) -> ClientResult<()> {
        self.endpoint.send_request(methods::PING, serde_json::json!({}), TimeoutPolicy::default()).await?;
        Ok(())
    }

    /// `tools/list`, refreshing the output-schema cache used by
    /// [`Client::call_tool`]. In [`crate::config::CapabilityMode::Lenient`],
    /// an unadvertised `tools` capability returns an empty list locally
    /// rather than round-tripping.
    pub async fn list_tools(&self) -> ClientResult<Vec<ToolDescriptor>> {
        if self.endpoint.should_skip_unsupported_list(GatedCapability::Tools) {
            return Ok(Vec::new());
        }
        self.endpoint.require_capability(GatedCapability::Tools)?;
        let value =
            self.endpoint.send_request(methods::TOOLS_LIST, serde_json::json!({}), TimeoutPolicy::default()).await?;
        let result: ListToolsResult = from_json(value)?;
        self.output_schemas.refresh(&result.tools);
        Ok(result.tools)
    }

    /// `tools/call`. The result's `structuredContent` is re-validated
    /// against the tool's cached `outputSchema` (spec.md §4.6 step 6's
    /// client-side mirror of the server's own validation). A tool that
    /// declares an `outputSchema` but returns a non-error result with no
    /// `structuredContent` at all is rejected here too.
    pub async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> ClientResult<CallToolResult> {
        self.endpoint.require_capability(GatedCapability::Tools)?;
        let params = CallToolParams { name: name.to_string(), arguments };
        let value = self
            .endpoint
            .send_request(methods::TOOLS_CALL, serde_json::to_value(params).expect("always serializes"), TimeoutPolicy::default())
            .await?;
        let result: CallToolResult = from_json(value)?;
        self.output_schemas.validate(name, result.structured_content.as_ref(), result.is_error)?;
        Ok(result)
    }

    pub async fn list_prompts(&self) -> ClientResult<ListPromptsResult> {
        if self.endpoint.should_skip_unsupported_list(GatedCapability::Prompts) {
            return Ok(ListPromptsResult { prompts: Vec::new(), next_cursor: None });
        }
        self.endpoint.require_capability(GatedCapability::Prompts)?;
        let value =
            self.endpoint.send_request(methods::PROMPTS_LIST, serde_json::json!({}), TimeoutPolicy::default()).await?;
        from_json(value)
    }

    pub async fn get_prompt(&self, params: GetPromptParams) -> ClientResult<GetPromptResult> {
        self.endpoint.require_capability(GatedCapability::Prompts)?;
        let value = self
            .endpoint
            .send_request(methods::PROMPTS_GET, serde_json::to_value(params).expect("always serializes"), TimeoutPolicy::default())
            .await?;
        from_json(value)
    }

    pub async fn list_resources(&self) -> ClientResult<ListResourcesResult> {
        if self.endpoint.should_skip_unsupported_list(GatedCapability::Resources) {
            return Ok(ListResourcesResult { resources: Vec::new(), next_cursor: None });
        }
        self.endpoint.require_capability(GatedCapability::Resources)?;
        let value = self
            .endpoint
            .send_request(methods::RESOURCES_LIST, serde_json::json!({}), TimeoutPolicy::default())
            .await?;
        from_json(value)
    }

    pub async fn list_resource_templates(&self) -> ClientResult<ListResourceTemplatesResult> {
        self.endpoint.require_capability(GatedCapability::Resources)?;
        let value = self
            .endpoint
            .send_request(methods::RESOURCES_TEMPLATES_LIST, serde_json::json!({}), TimeoutPolicy::default())
            .await?;
        from_json(value)
    }

    pub async fn read_resource(&self, uri: &str) -> ClientResult<ReadResourceResult> {
        self.endpoint.require_capability(GatedCapability::Resources)?;
        let params = ReadResourceParams { uri: uri.to_string() };
        let value = self
            .endpoint
            .send_request(methods::RESOURCES_READ, serde_json::to_value(params).expect("always serializes"), TimeoutPolicy::default())
            .await?;
        from_json(value)
    }

    pub async fn subscribe_resource(&self, uri: &str) -> ClientResult<()> {
        self.endpoint.require_capability(GatedCapability::ResourcesSubscribe)?;
        let params = SubscribeParams { uri: uri.to_string() };
        self.endpoint
            .send_request(methods::RESOURCES_SUBSCRIBE, serde_json::to_value(params).expect("always serializes"), TimeoutPolicy::default())
            .await?;
        Ok(())
    }

    pub async fn unsubscribe_resource(&self, uri: &str) -> ClientResult<()> {
        self.endpoint.require_capability(GatedCapability::ResourcesSubscribe)?;
        let params = UnsubscribeParams { uri: uri.to_string() };
        self.endpoint
            .send_request(methods::RESOURCES_UNSUBSCRIBE, serde_json::to_value(params).expect("always serializes"), TimeoutPolicy::default())
            .await?;
        Ok(())
    }

    pub async fn complete(&self, params: CompleteParams) -> ClientResult<CompleteResult> {
        let value = self
            .endpoint
            .send_request(methods::COMPLETION_COMPLETE, serde_json::to_value(params).expect("always serializes"), TimeoutPolicy::default())
            .await?;
        from_json(value)
    }

    pub async fn set_log_level(&self, level: LogLevel) -> ClientResult<()> {
        let params = SetLevelParams { level };
        self.endpoint
            .send_request(methods::LOGGING_SET_LEVEL, serde_json::to_value(params).expect("always serializes"), TimeoutPolicy::default())
            .await?;
        Ok(())
    }
}
