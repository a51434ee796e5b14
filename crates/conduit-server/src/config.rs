//! Server identity and capability-gating policy.

use conduit_protocol::{Implementation, ServerCapabilities};

/// How the engine behaves when asked to use a feature the peer never
/// advertised. See spec.md §4.1 "Capability gating".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapabilityMode {
    /// Fail locally with *method-not-found* instead of round-tripping.
    Strict,
    /// List-style peer calls (`roots/list`) return an empty result locally;
    /// other ungated calls are still attempted.
    #[default]
    Lenient,
}

/// Static identity and policy a [`crate::router::Router`] is built with.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_info: Implementation,
    pub capabilities: ServerCapabilities,
    pub instructions: Option<String>,
    pub capability_mode: CapabilityMode,
}

impl ServerConfig {
    pub fn new(server_info: Implementation) -> Self {
        Self {
            server_info,
            capabilities: ServerCapabilities::default(),
            instructions: None,
            capability_mode: CapabilityMode::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_capability_mode(mut self, mode: CapabilityMode) -> Self {
        self.capability_mode = mode;
        self
    }
}
