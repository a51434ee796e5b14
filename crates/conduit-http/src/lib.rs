//! # conduit-http
//!
//! Client-side streamable HTTP transport for Model Context Protocol
//! endpoints: a single MCP endpoint handling POST (request/response, either
//! immediate JSON or an SSE stream), GET (a persistent SSE stream for
//! server-initiated messages, resumable via `Last-Event-Id`), and DELETE
//! (session termination).
//!
//! Bearer-token authentication is pluggable via [`auth::TokenSource`]:
//! `conduit-auth`'s OAuth client implements it behind the `oauth` feature, a
//! static token via [`auth::StaticToken`] otherwise.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

mod auth;
mod config;
mod transport;

pub use auth::{StaticToken, TokenSource};
pub use config::{RetryPolicy, StreamableHttpClientConfig};
pub use transport::StreamableHttpClientTransport;

pub use conduit_transport_traits::{
    BidirectionalTransport, LimitsConfig, Transport, TransportCapabilities, TransportError,
    TransportMessage, TransportMessageMetadata, TransportResult, TransportState, TransportType,
};
