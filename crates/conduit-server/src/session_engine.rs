//! Correlation and timeout bookkeeping for requests the server originates
//! toward its peer, and cancellation propagation for requests the peer sent
//! in (spec.md §4.1 "Timeouts", "Cancellation propagation").

use crate::error::{ServerError, ServerResult};
use conduit_protocol::envelope::{JsonRpcResponse, RequestId};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How long the session engine waits for a server-originated request
/// (`elicit`, `create_sampling_message`, `list_roots`) before giving up.
/// Defaults to a 60 second fixed timeout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeoutPolicy {
    /// Fails if no reply arrives within `0` of the request being sent.
    Fixed(Duration),
    /// The deadline moves to `initial` past the most recent progress
    /// notification, capped at `max` total wall-clock time from the start
    /// if given.
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
}

/// A handle to one outstanding server-originated request, returned by
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

/// Correlates server-originated requests with their eventual reply, and
/// cancellation tokens for in-flight handlers with inbound
/// `notifications/cancelled`.
#[derive(Debug, Default)]
pub struct SessionEngine {
    outbound: DashMap<RequestId, (oneshot::Sender<JsonRpcResponse>, PendingCall)>,
    inbound_cancellation: DashMap<RequestId, CancellationToken>,
}

impl SessionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cancellation token for an inbound request so a later
    /// `notifications/cancelled` can reach the task handling it.
    pub fn begin_inbound(&self, id: RequestId) -> CancellationToken {
        let token = CancellationToken::new();
        self.inbound_cancellation.insert(id, token.clone());
        token
    }

    /// Drops the bookkeeping for an inbound request once its response has
    /// been sent (successfully or not) — a cancellation arriving after this
    /// is simply too late to matter.
    pub fn end_inbound(&self, id: &RequestId) {
        self.inbound_cancellation.remove(id);
    }

    /// Propagates an inbound `notifications/cancelled` to the handler
    /// processing that request, if it's still in flight.
    pub fn cancel_inbound(&self, id: &RequestId) {
        match self.inbound_cancellation.remove(id) {
            Some((_, token)) => token.cancel(),
            None => debug!(request_id = %id, "cancellation for an unknown or already-completed request"),
        }
    }

    /// Registers a server-originated request under `id`, returning a handle
    /// that resolves once the peer replies or the policy's deadline elapses.
    pub fn begin_outbound(&self, id: RequestId, policy: TimeoutPolicy) -> OutboundCall {
        let (tx, rx) = oneshot::channel();
        let started_at = Instant::now();
        let deadline = Arc::new(Mutex::new(policy.initial_deadline(started_at)));
        let cancellation = CancellationToken::new();
        self.outbound.insert(id.clone(), (tx, PendingCall { deadline: Arc::clone(&deadline) }));
        OutboundCall { id, receiver: rx, cancellation, deadline, policy, started_at }
    }

    /// Delivers the peer's reply for a previously-registered outbound
    /// request. A no-op if nobody is waiting any more.
    pub fn complete_outbound(&self, id: &RequestId, response: JsonRpcResponse) {
        if let Some((_, (tx, _))) = self.outbound.remove(id) {
            let _ = tx.send(response);
        }
    }

    /// Records progress toward an in-flight outbound request, pushing its
    /// deadline forward under [`TimeoutPolicy::ResetOnProgress`]. A no-op
    /// under [`TimeoutPolicy::Fixed`] or for an unknown/completed request.
    pub fn note_outbound_progress(&self, call: &OutboundCall) {
        let TimeoutPolicy::ResetOnProgress { initial, max } = call.policy else { return };
        let mut deadline = call.deadline.lock();
        let mut next = Instant::now() + initial;
        if let Some(max) = max {
            next = next.min(call.started_at + max);
        }
        *deadline = next;
    }

    /// Waits for `call`'s reply, failing with [`ServerError::TimedOut`] if
    /// its deadline elapses or [`ServerError::Cancelled`] if its
    /// cancellation token fires first.
    pub async fn await_reply(&self, mut call: OutboundCall) -> ServerResult<JsonRpcResponse> {
        loop {
            let sleep_until = *call.deadline.lock();
            tokio::select! {
                result = &mut call.receiver => {
                    self.outbound.remove(&call.id);
                    return result.map_err(|_| {
                        ServerError::Internal("peer reply channel dropped".to_string())
                    });
                }
                _ = tokio::time::sleep_until(sleep_until) => {
                    if Instant::now() >= *call.deadline.lock() {
                        self.outbound.remove(&call.id);
                        let waited = Instant::now().duration_since(call.started_at);
                        return Err(ServerError::TimedOut(call.id.to_string(), waited));
                    }
                    // deadline moved forward while we slept; loop and re-check.
                }
                _ = call.cancellation.cancelled() => {
                    self.outbound.remove(&call.id);
                    return Err(ServerError::Cancelled(call.id.to_string(), "request cancelled".to_string()));
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
    async fn cancel_inbound_on_unknown_request_is_a_no_op() {
        let engine = SessionEngine::new();
        engine.cancel_inbound(&RequestId::from(99));
    }

    #[tokio::test]
    async fn end_inbound_forgets_the_request_before_cancellation_arrives() {
        let engine = SessionEngine::new();
        let id: RequestId = 2.into();
        let token = engine.begin_inbound(id.clone());
        engine.end_inbound(&id);
        engine.cancel_inbound(&id);
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn await_reply_resolves_once_the_peer_responds() {
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
        assert!(matches!(err, ServerError::TimedOut(..)));
    }

    #[tokio::test]
    async fn await_reply_is_cancelled_by_an_external_token() {
        let engine = SessionEngine::new();
        let id: RequestId = 5.into();
        let call = engine.begin_outbound(id.clone(), TimeoutPolicy::Fixed(Duration::from_secs(5)));
        let cancellation = call.cancellation.clone();
        cancellation.cancel();
        let err = engine.await_reply(call).await.unwrap_err();
        assert!(matches!(err, ServerError::Cancelled(..)));
    }

    #[tokio::test]
    async fn progress_pushes_the_deadline_past_the_original_timeout() {
        let engine = SessionEngine::new();
        let id: RequestId = 6.into();
        let call = engine.begin_outbound(
            id.clone(),
            TimeoutPolicy::ResetOnProgress { initial: Duration::from_millis(60), max: None },
        );
        engine.note_outbound_progress(&call);
        tokio::time::sleep(Duration::from_millis(40)).await;
        engine.complete_outbound(&id, JsonRpcResponse::success(id.clone(), serde_json::json!(null)));
        let response = engine.await_reply(call).await.unwrap();
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn reset_on_progress_still_respects_the_max_cap() {
        let engine = SessionEngine::new();
        let id: RequestId = 7.into();
        let call = engine.begin_outbound(
            id.clone(),
            TimeoutPolicy::ResetOnProgress {
                initial: Duration::from_millis(500),
                max: Some(Duration::from_millis(20)),
            },
        );
        engine.note_outbound_progress(&call);
        let err = engine.await_reply(call).await.unwrap_err();
        assert!(matches!(err, ServerError::TimedOut(..)));
    }
}
