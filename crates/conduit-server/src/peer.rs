//! The server's view of its peer: a place to send notifications
//! (`notifications/progress`, `notifications/message`, `*/list_changed`)
//! and, for bidirectional calls (`sampling/createMessage`,
//! `elicitation/create`, `roots/list`), a place to send requests and await
//! a reply. A transport wires a concrete [`PeerSink`] in; tests use
//! [`NullPeerSink`] or a recording stub.

use crate::error::{ServerError, ServerResult};
use async_trait::async_trait;
use conduit_protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use std::time::Duration;

#[async_trait]
pub trait PeerSink: Send + Sync + std::fmt::Debug {
    /// Fire-and-forget; delivery failures are the transport's concern, not
    /// the caller's.
    async fn notify(&self, notification: JsonRpcNotification);

    /// A server-initiated request, awaiting the client's reply.
    async fn request(
        &self,
        request: JsonRpcRequest,
        timeout: Option<Duration>,
    ) -> ServerResult<JsonRpcResponse>;
}

/// The peer for a server with no bidirectional transport attached. Every
/// request fails with [`ServerError::PeerUnavailable`]; notifications are
/// silently dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPeerSink;

#[async_trait]
impl PeerSink for NullPeerSink {
    async fn notify(&self, _notification: JsonRpcNotification) {}

    async fn request(
        &self,
        _request: JsonRpcRequest,
        _timeout: Option<Duration>,
    ) -> ServerResult<JsonRpcResponse> {
        Err(ServerError::PeerUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_peer_rejects_requests() {
        let peer = NullPeerSink;
        let req = JsonRpcRequest::new(1.into(), "roots/list", None);
        let err = peer.request(req, None).await.unwrap_err();
        assert!(matches!(err, ServerError::PeerUnavailable));
    }

    #[tokio::test]
    async fn null_peer_swallows_notifications() {
        let peer = NullPeerSink;
        peer.notify(JsonRpcNotification::new("notifications/progress", None)).await;
    }
}
