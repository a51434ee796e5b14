//! Client configuration and auto-reconnect policy for the streamable HTTP
//! transport.

use std::collections::HashMap;
use std::time::Duration;

use conduit_transport_traits::LimitsConfig;

/// How the transport's SSE stream reconnects after the connection drops.
#[derive(Clone, Debug)]
pub enum RetryPolicy {
    /// Fixed interval between attempts.
    Fixed { interval: Duration, max_attempts: Option<u32> },
    /// Exponential backoff with ±25% jitter, capped at `max_delay`.
    Exponential { base: Duration, max_delay: Duration, max_attempts: Option<u32> },
    /// Never reconnect.
    Never,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: Some(10),
        }
    }
}

impl RetryPolicy {
    /// The delay before retry attempt `attempt` (0-indexed), or `None` if
    /// the policy says to give up.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::Fixed { interval, max_attempts } => {
                if max_attempts.is_some_and(|max| attempt >= max) {
                    return None;
                }
                Some(*interval)
            }
            Self::Exponential { base, max_delay, max_attempts } => {
                if max_attempts.is_some_and(|max| attempt >= max) {
                    return None;
                }
                let base_delay = base.as_millis() as u64 * 2u64.saturating_pow(attempt);
                let capped = base_delay.min(max_delay.as_millis() as u64);
                let jitter_range = capped / 4;
                let jitter_offset = if jitter_range > 0 {
                    let hash = (attempt as u64)
                        .wrapping_mul(6364136223846793005)
                        .wrapping_add(1442695040888963407);
                    hash % (jitter_range * 2)
                } else {
                    0
                };
                let delay = capped.saturating_sub(jitter_range).saturating_add(jitter_offset);
                Some(Duration::from_millis(delay))
            }
            Self::Never => None,
        }
    }
}

/// Configuration for [`crate::StreamableHttpClientTransport`].
#[derive(Clone, Debug)]
pub struct StreamableHttpClientConfig {
    /// Base URL, e.g. `https://api.example.com`.
    pub base_url: String,
    /// The single MCP endpoint path, e.g. `/mcp`.
    pub endpoint_path: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Reconnect policy for the GET/SSE stream.
    pub retry_policy: RetryPolicy,
    /// Static bearer token. Superseded per-request by a [`crate::auth::TokenSource`]
    /// if one is attached via `with_token_source`.
    pub auth_token: Option<String>,
    /// Extra headers sent with every request.
    pub headers: HashMap<String, String>,
    /// `User-Agent` header value. `None` disables the header entirely.
    pub user_agent: Option<String>,
    /// `MCP-Protocol-Version` header value offered on every request.
    pub protocol_version: String,
    /// Request/response body size limits.
    pub limits: LimitsConfig,
}

impl Default for StreamableHttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            endpoint_path: "/mcp".to_string(),
            timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            auth_token: None,
            headers: HashMap::new(),
            user_agent: Some(format!("conduit-http/{}", env!("CARGO_PKG_VERSION"))),
            protocol_version: conduit_protocol::ProtocolVersion::latest().as_str().to_string(),
            limits: LimitsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_gives_up_past_max_attempts() {
        let policy = RetryPolicy::Fixed { interval: Duration::from_secs(5), max_attempts: Some(3) };
        assert_eq!(policy.delay(0), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay(2), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay(3), None);
    }

    #[test]
    fn exponential_policy_grows_and_caps() {
        let policy =
            RetryPolicy::Exponential { base: Duration::from_secs(1), max_delay: Duration::from_secs(60), max_attempts: None };
        let delay0 = policy.delay(0).unwrap();
        assert!(delay0 >= Duration::from_millis(750) && delay0 <= Duration::from_millis(1250));
        let delay10 = policy.delay(10).unwrap();
        assert!(delay10 >= Duration::from_millis(45_000) && delay10 <= Duration::from_millis(75_000));
    }

    #[test]
    fn never_policy_always_gives_up() {
        assert!(RetryPolicy::Never.delay(0).is_none());
    }
}
