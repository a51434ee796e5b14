//! Session registry and SSE fan-out for the streamable HTTP server
//! transport: tracks each `Mcp-Session-Id`'s lifecycle, feeds its live GET
//! stream(s), and backs resumable delivery with
//! [`conduit_transport_streamable::EventStore`].
//!
//! Server-initiated peer calls (`sampling/createMessage`,
//! `elicitation/create`, `roots/list`, progress/log notifications) are
//! delivered the same way: appended to the originating session's stream as
//! an SSE event. [`HubPeer`] is the [`conduit_server::PeerSink`] that does
//! this; it learns which session it's acting for from [`CURRENT_SESSION`],
//! a task-local set for the lifetime of each request-handling future,
//! since `conduit_server::Router` holds one peer for its whole lifetime
//! rather than one per session.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use conduit_protocol::envelope::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};
use conduit_protocol::methods;
use conduit_protocol::progress::CancelledParams;
use conduit_server::{PeerSink, ServerError, ServerResult};
use conduit_transport_streamable::{EventStore, Session, SessionId, SessionState, SseEvent};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

tokio::task_local! {
    /// The session a request-handling future is acting on behalf of, so a
    /// shared [`HubPeer`] can route a peer call to the right SSE stream.
    static CURRENT_SESSION: SessionId;
}

/// Runs `fut` with `session` as the current session for any [`HubPeer`]
/// calls made within it.
pub async fn with_session<F: std::future::Future>(session: SessionId, fut: F) -> F::Output {
    CURRENT_SESSION.scope(session, fut).await
}

struct SessionEntry {
    session: Mutex<Session>,
    senders: Mutex<Vec<mpsc::UnboundedSender<SseEvent>>>,
}

/// Registry of live sessions and the SSE streams feeding each one, shared
/// between the transport's axum handlers and its [`HubPeer`].
pub struct SessionHub {
    sessions: DashMap<SessionId, Arc<SessionEntry>>,
    events: Arc<dyn EventStore>,
    pending: DashMap<(SessionId, RequestId), oneshot::Sender<JsonRpcResponse>>,
    idle_timeout_ms: u64,
}

impl std::fmt::Debug for SessionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHub").field("sessions", &self.sessions.len()).finish()
    }
}

impl SessionHub {
    pub fn new(events: Arc<dyn EventStore>, idle_timeout: std::time::Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            events,
            pending: DashMap::new(),
            idle_timeout_ms: idle_timeout.as_millis() as u64,
        }
    }

    /// Creates a new `Pending` session and primes its event stream cursor.
    pub fn create_session(&self) -> SessionId {
        let id = SessionId::new();
        self.events.append(id.as_str(), None);
        self.sessions.insert(
            id.clone(),
            Arc::new(SessionEntry { session: Mutex::new(Session::new(id.clone())), senders: Mutex::new(Vec::new()) }),
        );
        id
    }

    /// Looks up a session, rejecting one that has expired or been
    /// terminated.
    pub fn lookup(&self, id: &SessionId) -> Option<SessionId> {
        let entry = self.sessions.get(id)?;
        let mut session = entry.session.lock();
        if session.is_expired(now_ms(), self.idle_timeout_ms) {
            session.terminate();
            return None;
        }
        if !session.can_accept_requests() {
            return None;
        }
        session.touch();
        Some(id.clone())
    }

    pub fn activate(&self, id: &SessionId) {
        if let Some(entry) = self.sessions.get(id) {
            entry.session.lock().activate();
        }
    }

    pub fn terminate(&self, id: &SessionId) {
        if let Some(entry) = self.sessions.get(id) {
            entry.session.lock().terminate();
        }
        self.events.drop_stream(id.as_str());
        self.sessions.remove(id);
    }

    pub fn state(&self, id: &SessionId) -> Option<SessionState> {
        self.sessions.get(id).map(|e| e.session.lock().state)
    }

    /// Registers a new GET/SSE stream for `id`, returning the replay events
    /// for `last_event_id` (if given) and the receiver for live delivery.
    pub fn open_stream(
        &self,
        id: &SessionId,
        last_event_id: Option<&str>,
    ) -> (Vec<SseEvent>, mpsc::UnboundedReceiver<SseEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut replay = Vec::new();
        if let Some(cursor) = last_event_id {
            self.events.replay_after(cursor, &mut |event_id, payload| {
                replay.push(SseEvent::with_id(event_id.to_string(), payload.to_string()));
            });
        }
        if let Some(entry) = self.sessions.get(id) {
            entry.senders.lock().push(tx);
        }
        (replay, rx)
    }

    /// Appends `payload` to `id`'s event stream and fans it out to every
    /// live GET stream registered for it.
    pub fn broadcast(&self, id: &SessionId, payload: &str) {
        let event_id = self.events.append(id.as_str(), Some(payload.to_string()));
        let event = SseEvent::with_id(event_id, payload.to_string());
        if let Some(entry) = self.sessions.get(id) {
            entry.senders.lock().retain(|sender| sender.send(event.clone()).is_ok());
        }
    }

    fn register_pending(&self, session: SessionId, id: RequestId, tx: oneshot::Sender<JsonRpcResponse>) {
        self.pending.insert((session, id), tx);
    }

    /// Routes an inbound `JsonRpcResponse` (the client answering a
    /// server-initiated peer call) to whichever `request()` call is
    /// waiting on it, if any.
    pub fn resolve_pending(&self, session: &SessionId, response: JsonRpcResponse) -> bool {
        if let Some((_, tx)) = self.pending.remove(&(session.clone(), response.id.clone())) {
            let _ = tx.send(response);
            true
        } else {
            false
        }
    }

    fn remove_pending(&self, session: &SessionId, id: &RequestId) {
        self.pending.remove(&(session.clone(), id.clone()));
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// The [`PeerSink`] a [`crate::StreamableHttpServer`] gives `conduit-server`'s
/// `Router`: every call is attributed to [`CURRENT_SESSION`] and delivered
/// as an SSE event on that session's GET stream.
#[derive(Debug, Clone)]
pub struct HubPeer {
    hub: Arc<SessionHub>,
}

impl HubPeer {
    pub fn new(hub: Arc<SessionHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl PeerSink for HubPeer {
    async fn notify(&self, notification: JsonRpcNotification) {
        let Ok(session) = CURRENT_SESSION.try_with(|s| s.clone()) else {
            return;
        };
        let payload = serde_json::to_string(&notification).expect("notification always serializes");
        self.hub.broadcast(&session, &payload);
    }

    async fn request(&self, request: JsonRpcRequest, timeout: Option<std::time::Duration>) -> ServerResult<JsonRpcResponse> {
        let Ok(session) = CURRENT_SESSION.try_with(|s| s.clone()) else {
            return Err(ServerError::PeerUnavailable);
        };
        let (tx, rx) = oneshot::channel();
        self.hub.register_pending(session.clone(), request.id.clone(), tx);
        let payload = serde_json::to_string(&request).expect("request always serializes");
        self.hub.broadcast(&session, &payload);

        let outcome = match timeout {
            Some(duration) => match tokio::time::timeout(duration, rx).await {
                Ok(result) => result,
                Err(_) => {
                    self.hub.remove_pending(&session, &request.id);
                    let cancelled = JsonRpcNotification::new(
                        methods::NOTIFICATIONS_CANCELLED,
                        Some(
                            serde_json::to_value(CancelledParams {
                                request_id: request.id.clone(),
                                reason: Some("timeout".to_string()),
                            })
                            .expect("always serializes"),
                        ),
                    );
                    let payload = serde_json::to_string(&cancelled).expect("notification always serializes");
                    self.hub.broadcast(&session, &payload);
                    return Err(ServerError::TimedOut(request.id.to_string(), duration));
                }
            },
            None => rx.await.map_err(|_| ServerError::PeerUnavailable)?,
        };
        outcome.map_err(|_| ServerError::PeerUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_transport_streamable::InMemoryEventStore;
    use std::time::Duration;

    fn hub() -> SessionHub {
        SessionHub::new(Arc::new(InMemoryEventStore::new()), Duration::from_secs(60))
    }

    #[test]
    fn created_session_can_be_looked_up() {
        let hub = hub();
        let id = hub.create_session();
        assert!(hub.lookup(&id).is_some());
    }

    #[test]
    fn terminated_session_is_not_found() {
        let hub = hub();
        let id = hub.create_session();
        hub.terminate(&id);
        assert!(hub.lookup(&id).is_none());
    }

    #[tokio::test]
    async fn broadcast_reaches_an_open_stream() {
        let hub = hub();
        let id = hub.create_session();
        let (replay, mut rx) = hub.open_stream(&id, None);
        assert!(replay.is_empty());
        hub.broadcast(&id, "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}");
        let event = rx.recv().await.unwrap();
        assert!(event.data.contains("notifications/progress"));
    }

    #[tokio::test]
    async fn hub_peer_notifies_the_current_session() {
        let hub = Arc::new(hub());
        let id = hub.create_session();
        let (_, mut rx) = hub.open_stream(&id, None);
        let peer = HubPeer::new(Arc::clone(&hub));

        with_session(id, async {
            peer.notify(JsonRpcNotification::new("notifications/progress", None)).await;
        })
        .await;

        let event = rx.recv().await.unwrap();
        assert!(event.data.contains("notifications/progress"));
    }

    #[tokio::test]
    async fn hub_peer_request_times_out_without_a_reply() {
        let hub = Arc::new(hub());
        let id = hub.create_session();
        let (_, mut rx) = hub.open_stream(&id, None);
        let peer = HubPeer::new(Arc::clone(&hub));

        let result = with_session(id, async {
            peer.request(
                JsonRpcRequest::new(1.into(), "roots/list", None),
                Some(Duration::from_millis(20)),
            )
            .await
        })
        .await;

        assert!(matches!(result, Err(ServerError::TimedOut(..))));

        // the request itself is broadcast first, then the timeout notification.
        let _request_event = rx.recv().await.unwrap();
        let cancelled_event = rx.recv().await.unwrap();
        assert!(cancelled_event.data.contains("notifications/cancelled"));
        assert!(cancelled_event.data.contains("\"reason\":\"timeout\""));
    }

    #[tokio::test]
    async fn resolve_pending_fulfills_a_waiting_request() {
        let hub = Arc::new(hub());
        let id = hub.create_session();
        let peer = HubPeer::new(Arc::clone(&hub));
        let hub_for_resolver = Arc::clone(&hub);
        let id_for_resolver = id.clone();

        let request_fut = with_session(id.clone(), async {
            peer.request(JsonRpcRequest::new(1.into(), "roots/list", None), None).await
        });

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            hub_for_resolver.resolve_pending(
                &id_for_resolver,
                JsonRpcResponse::success(1.into(), serde_json::json!({"roots": []})),
            );
        });

        let response = request_fut.await.unwrap();
        assert!(response.is_success());
    }
}
