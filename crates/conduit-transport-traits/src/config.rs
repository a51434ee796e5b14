//! Transport configuration types shared across stdio and streamable-HTTP transports.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request and response body size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum response body size in bytes. `None` = unlimited.
    pub max_response_size: Option<usize>,
    /// Maximum request body size in bytes. `None` = unlimited.
    pub max_request_size: Option<usize>,
    /// Whether to enforce limits while streaming (SSE).
    pub enforce_on_streams: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_response_size: Some(10 * 1024 * 1024),
            max_request_size: Some(1024 * 1024),
            enforce_on_streams: true,
        }
    }
}

impl LimitsConfig {
    /// No limits at all.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self { max_response_size: None, max_request_size: None, enforce_on_streams: false }
    }

    /// Strict limits suitable for untrusted servers.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            max_response_size: Some(1024 * 1024),
            max_request_size: Some(256 * 1024),
            enforce_on_streams: true,
        }
    }
}

/// Request and operation timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection establishment timeout.
    pub connect: Duration,
    /// Single request timeout. `None` = no timeout.
    pub request: Option<Duration>,
    /// Read timeout for streaming responses.
    pub read: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            request: Some(Duration::from_secs(60)),
            read: Some(Duration::from_secs(30)),
        }
    }
}

impl TimeoutConfig {
    /// Short timeouts for latency-sensitive callers.
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            connect: Duration::from_secs(5),
            request: Some(Duration::from_secs(10)),
            read: Some(Duration::from_secs(5)),
        }
    }

    /// No timeouts.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self { connect: Duration::from_secs(30), request: None, read: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_default_is_bounded() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.max_request_size, Some(1024 * 1024));
    }

    #[test]
    fn unlimited_clears_all_bounds() {
        let limits = LimitsConfig::unlimited();
        assert!(limits.max_response_size.is_none());
        assert!(!limits.enforce_on_streams);
    }
}
