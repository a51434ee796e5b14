//! Session state for the streamable HTTP transport: one [`Session`] per
//! `Mcp-Session-Id`, tracking lifecycle and the SSE stream cursor.

use std::time::{SystemTime, UNIX_EPOCH};

use conduit_transport_traits::SessionId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Initialized but the client hasn't sent its `initialized` notification yet.
    #[default]
    Pending,
    /// Accepting requests.
    Active,
    /// Torn down via DELETE or idle timeout.
    Terminated,
}

/// A live MCP session: identity, lifecycle, and enough bookkeeping to
/// support resumable SSE delivery and idle expiry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    pub created_at_ms: u64,
    pub last_activity_ms: u64,
    pub protocol_version: Option<String>,
    pub client_name: Option<String>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        let now = now_ms();
        Self::new_with_timestamp(id, now)
    }

    pub fn new_with_timestamp(id: SessionId, timestamp_ms: u64) -> Self {
        Self {
            id,
            state: SessionState::Pending,
            created_at_ms: timestamp_ms,
            last_activity_ms: timestamp_ms,
            protocol_version: None,
            client_name: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active)
    }

    pub fn can_accept_requests(&self) -> bool {
        matches!(self.state, SessionState::Active | SessionState::Pending)
    }

    pub fn activate(&mut self) {
        self.state = SessionState::Active;
    }

    pub fn terminate(&mut self) {
        self.state = SessionState::Terminated;
    }

    pub fn touch(&mut self) {
        self.last_activity_ms = now_ms();
    }

    pub fn touch_with_timestamp(&mut self, timestamp_ms: u64) {
        self.last_activity_ms = timestamp_ms;
    }

    /// Whether this session has been idle longer than `timeout_ms`, measured
    /// from `current_time_ms`.
    pub fn is_expired(&self, current_time_ms: u64, timeout_ms: u64) -> bool {
        current_time_ms.saturating_sub(self.last_activity_ms) > timeout_ms
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}
