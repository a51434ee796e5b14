//! Correlation and timeout bookkeeping for requests the client originates
//! toward the server, and cancellation propagation for server-initiated
//! requests (`sampling/createMessage`, `elicitation/create`, `roots/list`)
//! the client is handling (spec.md §4.1 "Timeouts", "Cancellation
//! propagation"). Mirrors `conduit-server::session_engine` with the roles
//! swapped: here "outbound" is the client's own traffic, not a peer
//! call-back.

use crate::error::ClientError;
use conduit_protocol::envelope::{JsonRpcResponse, RequestId};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How a pending request's deadline behaves (spec.md §4.1 "Timeouts").
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeoutPolicy {
    Fixed(Duration),
    ResetOnProgress { initial: Duration, max: Option<Duration> },
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        TimeoutPolicy::Fixed(Duration::from_secs(60))
    }
}

impl TimeoutPolicy {
    fn initial_deadline(&self, started_at: Instant) -> Instant {
        match self {
            TimeoutPolicy::Fixed(d) => started_at + *d,
            TimeoutPolicy::ResetOnProgress { initial, .. } => started_at + *initial,
        }
    }
}

struct PendingCall {
    deadline: Arc<Mutex<Instant>>,
    policy: TimeoutPolicy,
    started_at: Instant,
}

/// A handle to one outstanding client-originated request, returned by
/// [`SessionEngine::begin_outbound`] and consumed by
/// [`SessionEngine::await_reply`].
pub struct OutboundCall {
    id: RequestId,
    receiver: oneshot::Receiver<JsonRpcResponse>,
    cancellation: CancellationToken,
    deadline: Arc<Mutex<Instant>>,
    policy: TimeoutPolicy,
    started_at: Instant,
}

impl OutboundCall {
    pub fn id(&self) -> &RequestId {
        &self.id
    }
}

/// Correlates client-originated requests with their eventual reply, and
/// cancellation tokens for in-flight handlers of server-initiated requests
/// with inbound `notifications/cancelled`.
#[derive(Debug, Default)]
pub struct SessionEngine {
    outbound: DashMap<RequestId, (oneshot::Sender<JsonRpcResponse>, PendingCall, CancellationToken)>,
    inbound_cancellation: DashMap<RequestId, CancellationToken>,
}

impl SessionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cancellation token for an inbound (server-initiated)
    /// request so a later `notifications/cancelled` can reach the task
    /// handling it.
    pub fn begin_inbound(&self, id: RequestId) -> CancellationToken {
        let token = CancellationToken::new();
        self.inbound_cancellation.insert(id, token.clone());
        token
    }

    pub fn end_inbound(&self, id: &RequestId) {
        self.inbound_cancellation.remove(id);
    }

    pub fn cancel_inbound(&self, id: &RequestId) {
        match self.inbound_cancellation.remove(id) {
            Some((_, token)) => token.cancel(),
            None => debug!(request_id = %id, "cancellation for an unknown or already-completed request"),
        }
    }

    /// Registers a client-originated request under `id`, returning a handle
    /// that resolves once the server replies or the policy's deadline
    /// elapses.
    pub fn begin_outbound(&self, id: RequestId, policy: TimeoutPolicy) -> OutboundCall {
        let (tx, rx) = oneshot::channel();
        let started_at = Instant::now();
        let deadline = Arc::new(Mutex::new(policy.initial_deadline(started_at)));
        let cancellation = CancellationToken::new();
        self.outbound.insert(
            id.clone(),
            (tx, PendingCall { deadline: Arc::clone(&deadline), policy, started_at }, cancellation.clone()),
        );
        OutboundCall { id, receiver: rx, cancellation, deadline, policy, started_at }
    }

    /// Delivers the server's reply for a previously-registered outbound
    /// request. A no-op if nobody is waiting any more.
    pub fn complete_outbound(&self, id: &RequestId, response: JsonRpcResponse) {
        if let Some((_, (tx, ..))) = self.outbound.remove(id) {
            let _ = tx.send(response);
        }
    }

    /// Cancels a pending outbound request by id — the public `cancel()`
    /// operation (spec.md §4.1): the caller awaiting its `await_reply` sees
    /// [`ClientError::Cancelled`] as soon as the cancellation token fires,
    /// regardless of who holds the `OutboundCall`.
    pub fn cancel_outbound(&self, id: &RequestId) {
        match self.outbound.get(id) {
            Some(entry) => entry.2.cancel(),
            None => debug!(request_id = %id, "cancel requested for an unknown or already-completed request"),
        }
    }

    /// Cancels every pending outbound request, used when a managed wrapper
    /// tears an endpoint down before reconnecting.
    pub fn cancel_all_outbound(&self) {
        for entry in self.outbound.iter() {
            entry.2.cancel();
        }
    }

    pub fn note_outbound_progress(&self, call: &OutboundCall) {
        Self::reset_deadline(&call.deadline, call.policy, call.started_at);
    }

    /// Resets a pending outbound request's deadline by id, for progress
    /// notifications observed on the receive loop rather than by whichever
    /// task is holding its [`OutboundCall`] (spec.md §4.1 "Progress": a
    /// progress notification under a request's token resets
    /// `ResetOnProgress` deadlines).
    pub fn note_progress(&self, id: &RequestId) {
        if let Some(entry) = self.outbound.get(id) {
            let (_, pending, _) = entry.value();
            Self::reset_deadline(&pending.deadline, pending.policy, pending.started_at);
        }
    }

    fn reset_deadline(deadline: &Mutex<Instant>, policy: TimeoutPolicy, started_at: Instant) {
        let TimeoutPolicy::ResetOnProgress { initial, max } = policy else { return };
        let mut deadline = deadline.lock();
        let mut next = Instant::now() + initial;
        if let Some(max) = max {
            next = next.min(started_at + max);
        }
        *deadline = next;
    }

    /// Waits for `call`'s reply, failing with [`ClientError::TimedOut`] if
    /// its deadline elapses or [`ClientError::Cancelled`] if its
    /// cancellation token fires first.
    pub async fn await_reply(&self, mut call: OutboundCall) -> Result<JsonRpcResponse, ClientError> {
        loop {
            let sleep_until = *call.deadline.lock();
            tokio::select! {
                result = &mut call.receiver => {
                    self.outbound.remove(&call.id);
                    return result.map_err(|_| {
                        ClientError::Internal("server reply channel dropped".to_string())
                    });
                }
                _ = tokio::time::sleep_until(sleep_until) => {
                    if Instant::now() >= *call.deadline.lock() {
                        self.outbound.remove(&call.id);
                        let waited = Instant::now().duration_since(call.started_at);
                        return Err(ClientError::TimedOut(call.id.to_string(), waited));
                    }
                }
                _ = call.cancellation.cancelled() => {
                    self.outbound.remove(&call.id);
                    return Err(ClientError::Cancelled(call.id.to_string(), "request cancelled".to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_protocol::envelope::JsonRpcResponse;

    #[tokio::test]
    async fn cancel_inbound_fires_the_registered_token() {
        let engine = SessionEngine::new();
        let id: RequestId = 1.into();
        let token = engine.begin_inbound(id.clone());
        assert!(!token.is_cancelled());
        engine.cancel_inbound(&id);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn await_reply_resolves_once_the_server_responds() {
        let engine = SessionEngine::new();
        let id: RequestId = 3.into();
        let call = engine.begin_outbound(id.clone(), TimeoutPolicy::Fixed(Duration::from_secs(5)));
        engine.complete_outbound(&id, JsonRpcResponse::success(id.clone(), serde_json::json!({"ok": true})));
        let response = engine.await_reply(call).await.unwrap();
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn await_reply_times_out_under_a_short_fixed_policy() {
        let engine = SessionEngine::new();
        let id: RequestId = 4.into();
        let call = engine.begin_outbound(id.clone(), TimeoutPolicy::Fixed(Duration::from_millis(20)));
        let err = engine.await_reply(call).await.unwrap_err();
        assert!(matches!(err, ClientError::TimedOut(..)));
    }

    #[tokio::test]
    async fn cancel_all_outbound_resolves_pending_calls_with_cancelled() {
        let engine = SessionEngine::new();
        let id: RequestId = 5.into();
        let call = engine.begin_outbound(id.clone(), TimeoutPolicy::Fixed(Duration::from_secs(5)));
        engine.cancel_all_outbound();
        let err = engine.await_reply(call).await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled(..)));
    }

    #[tokio::test]
    async fn cancel_outbound_by_id_resolves_the_matching_call() {
        let engine = SessionEngine::new();
        let id: RequestId = 6.into();
        let call = engine.begin_outbound(id.clone(), TimeoutPolicy::Fixed(Duration::from_secs(5)));
        engine.cancel_outbound(&id);
        let err = engine.await_reply(call).await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled(..)));
    }

    #[tokio::test]
    async fn reset_on_progress_still_respects_the_max_cap() {
        let engine = SessionEngine::new();
        let id: RequestId = 7.into();
        let call = engine.begin_outbound(
            id.clone(),
            TimeoutPolicy::ResetOnProgress { initial: Duration::from_millis(500), max: Some(Duration::from_millis(20)) },
        );
        engine.note_outbound_progress(&call);
        let err = engine.await_reply(call).await.unwrap_err();
        assert!(matches!(err, ClientError::TimedOut(..)));
    }

    #[tokio::test]
    async fn note_progress_by_id_extends_a_reset_on_progress_deadline() {
        let engine = SessionEngine::new();
        let id: RequestId = 8.into();
        let call = engine.begin_outbound(
            id.clone(),
            TimeoutPolicy::ResetOnProgress { initial: Duration::from_millis(30), max: None },
        );
        tokio::time::sleep(Duration::from_millis(15)).await;
        engine.note_progress(&id);
        engine.complete_outbound(&id, JsonRpcResponse::success(id.clone(), serde_json::json!({"ok": true})));
        let response = engine.await_reply(call).await.unwrap();
        assert!(response.is_success());
    }
}
