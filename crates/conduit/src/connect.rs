//! Convenience constructors pairing a [`conduit_client::Client`] with a
//! concrete transport and running the `initialize` handshake, so a caller
//! doesn't have to assemble `ClientEndpoint::new` + `.connect()` +
//! `Client::new` by hand for the two transports this workspace ships.

use std::sync::Arc;

use conduit_client::{Client, ClientConfig, ClientEndpoint, ClientError};
use conduit_protocol::Implementation;

/// Connects over stdio — spawns `command` as a child process is left to the
/// caller; this just wraps an already-constructed [`conduit_stdio::StdioTransport`]
/// talking to stdin/stdout of the current process (the common case: this
/// binary *is* the child process a parent MCP host launched).
#[cfg(feature = "stdio")]
pub async fn connect_stdio(client_info: Implementation) -> Result<Client, ClientError> {
    let transport = Arc::new(conduit_stdio::StdioTransport::new());
    connect_with(transport, ClientConfig::new(client_info)).await
}

/// Connects over streamable HTTP to `config.base_url`.
#[cfg(feature = "http")]
pub async fn connect_http(
    client_info: Implementation,
    http_config: conduit_http::StreamableHttpClientConfig,
) -> Result<Client, ClientError> {
    let transport = Arc::new(conduit_http::StreamableHttpClientTransport::new(http_config));
    connect_with(transport, ClientConfig::new(client_info)).await
}

async fn connect_with(
    transport: Arc<dyn conduit_transport_traits::Transport>,
    config: ClientConfig,
) -> Result<Client, ClientError> {
    let endpoint = ClientEndpoint::new(transport, config);
    endpoint.connect().await?;
    Ok(Client::new(endpoint))
}
