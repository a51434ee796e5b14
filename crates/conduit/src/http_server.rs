//! Binds a [`conduit_server::Router`] to [`conduit_transport::StreamableHttpServer`]
//! and serves it over TCP via `axum::serve`, tracking the peer's real
//! address the way origin validation needs (spec.md §7's DNS-rebinding
//! defense reads `ConnectInfo<SocketAddr>`, which only `axum::serve`'s
//! `into_make_service_with_connect_info` variant populates).

use std::net::SocketAddr;

use conduit_server::{Router, ServerResult};
use conduit_transport::{StreamableHttpServer, StreamableHttpServerConfig};

/// Serves `router` at `addr` until the process is killed or the listener
/// errors. Equivalent to the donor's `run_server`, minus graceful-shutdown
/// wiring the caller is expected to layer on with `axum::serve`'s
/// `with_graceful_shutdown` if it needs one.
pub async fn serve(router: Router, addr: SocketAddr, config: StreamableHttpServerConfig) -> ServerResult<()> {
    let server = StreamableHttpServer::new(router, config);
    let app = server.into_router();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| conduit_server::ServerError::Internal(format!("failed to bind {addr}: {e}")))?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| conduit_server::ServerError::Internal(format!("http server exited: {e}")))
}
