//! Client identity and capability-gating policy (mirrors
//! `conduit-server::config`'s `CapabilityMode` for the opposite role,
//! spec.md §4.1 "Capability gating").

use conduit_protocol::{ClientCapabilities, Implementation};

/// How the endpoint behaves when asked to use a server feature the peer
/// never advertised during `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapabilityMode {
    /// Fail locally with *method-not-found* instead of round-tripping.
    Strict,
    /// List-style calls (`tools/list`, `prompts/list`, `resources/list`)
    /// return an empty result locally when the server never advertised the
    /// matching capability.
    #[default]
    Lenient,
}

/// Static identity and policy a [`crate::endpoint::ClientEndpoint`] is built
/// with.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_info: Implementation,
    pub capabilities: ClientCapabilities,
    pub capability_mode: CapabilityMode,
}

impl ClientConfig {
    pub fn new(client_info: Implementation) -> Self {
        Self { client_info, capabilities: ClientCapabilities::default(), capability_mode: CapabilityMode::default() }
    }

    pub fn with_capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_capability_mode(mut self, mode: CapabilityMode) -> Self {
        self.capability_mode = mode;
        self
    }
}
