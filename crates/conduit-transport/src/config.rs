//! Configuration for the server-side streamable HTTP transport.

use std::time::Duration;

use conduit_transport_traits::LimitsConfig;

use crate::origin::OriginConfig;

/// Policy for a [`crate::StreamableHttpServer`]: the single MCP endpoint
/// path, SSE keep-alive cadence, session idle expiry, origin validation,
/// and request/response size limits.
#[derive(Clone, Debug)]
pub struct StreamableHttpServerConfig {
    pub endpoint_path: String,
    pub keep_alive: Duration,
    pub session_idle_timeout: Duration,
    pub origin: OriginConfig,
    pub limits: LimitsConfig,
}

impl Default for StreamableHttpServerConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/mcp".to_string(),
            keep_alive: Duration::from_secs(30),
            session_idle_timeout: Duration::from_secs(30 * 60),
            origin: OriginConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl StreamableHttpServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = path.into();
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = timeout;
        self
    }

    pub fn with_origin(mut self, origin: OriginConfig) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_mcp_endpoint_convention() {
        let config = StreamableHttpServerConfig::default();
        assert_eq!(config.endpoint_path, "/mcp");
        assert_eq!(config.keep_alive, Duration::from_secs(30));
    }
}
