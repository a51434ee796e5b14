//! # conduit
//!
//! Rust SDK for the Model Context Protocol (MCP): a session engine shared
//! by both roles, a streamable HTTP transport, an OAuth 2.0 client
//! subsystem, and the `#[tool]`/`#[prompt]`/`#[resource]`/`#[server]`
//! attribute macros for registering handlers.
//!
//! This crate is the facade: [`prelude`] gathers the pieces most programs
//! need, and [`stdio_server`]/[`http_server`]/[`connect`] wire a
//! [`conduit_server::Router`] or [`conduit_client::Client`] to a concrete
//! transport, feature-gated the way the rest of the workspace is.
//!
//! ```no_run
//! use conduit::prelude::*;
//! use std::sync::Arc;
//!
//! #[derive(Clone)]
//! struct Calculator;
//!
//! #[server(name = "calculator", version = "1.0.0")]
//! impl Calculator {
//!     #[tool("Add two numbers")]
//!     async fn add(&self, a: i32, b: i32) -> conduit::Result<i32> {
//!         Ok(a + b)
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let router = Arc::new(Calculator).into_router()?;
//! conduit::stdio_server::serve(router).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "stdio")]
pub mod stdio_server;

#[cfg(feature = "http")]
pub mod http_server;

#[cfg(feature = "client")]
pub mod connect;

pub mod prelude;

pub use conduit_core::{Error, ErrorKind, Result};
pub use conduit_macros::{prompt, resource, server, tool};
pub use conduit_protocol as protocol;
pub use conduit_server as server_core;
pub use conduit_server::{HandlerContext, Router, ServerConfig, ServerError, ServerResult};

#[cfg(feature = "stdio")]
pub use conduit_stdio::StdioTransport;

#[cfg(feature = "http")]
pub use conduit_transport::{StreamableHttpServer, StreamableHttpServerConfig};

#[cfg(feature = "http")]
pub use conduit_auth as auth;

#[cfg(feature = "client")]
pub use conduit_client::{Client, ClientConfig};

#[cfg(feature = "client")]
pub use conduit_client as client_core;

pub use tokio;
pub use tracing;

#[cfg(feature = "tracing-subscriber")]
/// Installs a `tracing-subscriber` `fmt` layer writing to stderr, honoring
/// `RUST_LOG`. Stdio transports must never let logging reach stdout, so
/// this is the one initialization helper this crate offers rather than
/// leaving it to each binary to get right.
pub fn init_stderr_logging() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
