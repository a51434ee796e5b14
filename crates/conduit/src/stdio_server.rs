//! Drives a [`conduit_server::Router`] over [`conduit_stdio::StdioTransport`]:
//! read one newline-delimited JSON-RPC message, route it, write the
//! response back, repeat until the transport's reader task observes EOF.
//!
//! Grounded on the donor's stdio run-loop shape (connect, pull from
//! `Transport::receive` in a loop, route each message, send the response)
//! generalized to this workspace's `JsonRpcMessage::parse` single-vs-batch
//! envelope instead of the donor's framed-message type.

use std::sync::Arc;

use conduit_protocol::envelope::{JsonRpcMessage, JsonRpcSingleMessage};
use conduit_server::{Router, ServerResult};
use conduit_stdio::StdioTransport;
use conduit_transport_traits::{Transport, TransportMessage};
use tracing::{debug, warn};

/// Runs `router` against stdin/stdout until the client closes the pipe.
/// A message that fails to parse is dropped with a warning rather than
/// tearing down the loop — there's no request id to reply to.
pub async fn serve(router: Router) -> ServerResult<()> {
    let transport = StdioTransport::new();
    serve_on(router, transport).await
}

/// Same as [`serve`], but over a caller-supplied transport (e.g. one built
/// with [`StdioTransport::with_limits`]).
pub async fn serve_on(router: Router, transport: StdioTransport) -> ServerResult<()> {
    let router = Arc::new(router);
    transport.connect().await.map_err(|e| conduit_server::ServerError::Internal(e.to_string()))?;

    while let Some(message) =
        transport.receive().await.map_err(|e| conduit_server::ServerError::Internal(e.to_string()))?
    {
        let router = Arc::clone(&router);
        let reply = match JsonRpcMessage::parse(&message.payload) {
            Ok(JsonRpcMessage::Single(JsonRpcSingleMessage::Request(request))) => {
                let response = router.route(request, None).await;
                Some(serde_json::to_string(&response).expect("response always serializes"))
            }
            Ok(JsonRpcMessage::Single(JsonRpcSingleMessage::Notification(notification))) => {
                router.handle_notification(notification, None);
                None
            }
            Ok(JsonRpcMessage::Batch(items)) => {
                let requests: Vec<_> = items
                    .into_iter()
                    .filter_map(|item| match item {
                        JsonRpcSingleMessage::Request(request) => Some(request),
                        JsonRpcSingleMessage::Notification(notification) => {
                            router.handle_notification(notification, None);
                            None
                        }
                        JsonRpcSingleMessage::Response(_) => None,
                    })
                    .collect();
                if requests.is_empty() {
                    None
                } else {
                    let responses = router.route_batch(requests, None).await;
                    Some(serde_json::to_string(&responses).expect("batch response always serializes"))
                }
            }
            Ok(JsonRpcMessage::Single(JsonRpcSingleMessage::Response(_))) => {
                debug!("ignoring a response-shaped message on the server side");
                None
            }
            Err(err) => {
                warn!(%err, "dropping a message that failed to parse as JSON-RPC");
                None
            }
        };

        if let Some(payload) = reply {
            transport
                .send(TransportMessage::new(None, payload))
                .await
                .map_err(|e| conduit_server::ServerError::Internal(e.to_string()))?;
        }
    }

    Ok(())
}
