//! # conduit-transport
//!
//! Server-side streamable HTTP transport for Model Context Protocol
//! endpoints: one axum router serving `POST`/`GET`/`DELETE` on a single
//! configured path, a per-session SSE hub for server-initiated messages
//! with replay via `Last-Event-Id`, and `Origin`-header validation against
//! DNS-rebinding attacks.
//!
//! [`StreamableHttpServer`] owns the wiring: hand it a
//! [`conduit_server::Router`] (registries + handshake state) and a
//! [`StreamableHttpServerConfig`], get back an [`axum::Router`] ready to
//! bind and serve.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod hub;
mod origin;
mod service;

use std::sync::Arc;

pub use config::StreamableHttpServerConfig;
pub use hub::{with_session, HubPeer, SessionHub};
pub use origin::{validate_origin, OriginConfig};

pub use conduit_transport_streamable::{EventStore, InMemoryEventStore};

/// Builds the `conduit_server::Router`'s peer and axum router together: the
/// `Router` dispatches through `HubPeer`, and `HubPeer` delivers through the
/// same `SessionHub` the axum handlers use for SSE fan-out.
#[derive(Debug)]
pub struct StreamableHttpServer {
    hub: Arc<SessionHub>,
    axum_router: axum::Router,
}

impl StreamableHttpServer {
    /// `router` should not already carry a peer; this constructor installs
    /// [`HubPeer`] so server-initiated calls (`sampling/createMessage`,
    /// `elicitation/create`, `roots/list`, progress/log notifications) are
    /// delivered over the right session's SSE stream.
    pub fn new(router: conduit_server::Router, config: StreamableHttpServerConfig) -> Self {
        let events: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
        let hub = Arc::new(SessionHub::new(events, config.session_idle_timeout));
        let router = router.with_peer(Arc::new(HubPeer::new(Arc::clone(&hub))));
        let axum_router = service::build_router(Arc::new(router), Arc::clone(&hub), config);
        Self { hub, axum_router }
    }

    /// The session registry, exposed for diagnostics and tests.
    pub fn sessions(&self) -> &SessionHub {
        &self.hub
    }

    /// Hands back the axum router for the caller to bind and serve
    /// (typically via `axum::serve(listener,
    /// app.into_make_service_with_connect_info::<SocketAddr>())`, since
    /// origin validation needs the peer's real address).
    pub fn into_router(self) -> axum::Router {
        self.axum_router
    }
}
