//! # conduit-client
//!
//! The client-role session engine for Model Context Protocol endpoints:
//! request/notification dispatch, capability negotiation, the
//! `initialize`/`notifications/initialized` handshake, timeout, batching,
//! and cancellation bookkeeping for the client's own outbound traffic, and
//! dispatch of server-initiated requests (`sampling/createMessage`,
//! `elicitation/create`, `roots/list`) to application-registered handlers.
//!
//! [`endpoint::ClientEndpoint`] is the raw session; [`client::Client`] wraps
//! it with typed `tools`/`prompts`/`resources` convenience methods.
//! [`reconnect::ManagedClient`] adds automatic reconnection with exponential
//! backoff on top of either.
//!
//! A transport (`conduit-transport`, `conduit-stdio`) owns the wire format
//! and is driven through `conduit_transport_traits::Transport`; this crate
//! never touches a socket or a stream directly.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod handler_registry;
pub mod reconnect;
pub mod session_engine;
pub mod validator;

pub use client::Client;
pub use config::{CapabilityMode, ClientConfig};
pub use endpoint::{BatchRequest, ClientEndpoint, GatedCapability};
pub use error::{is_recoverable, ClientError, ClientResult};
pub use handler_registry::{HandlerRegistry, NotificationHandlerFn, RequestHandlerFn};
pub use reconnect::{ConnectionState, ManagedClient, ReconnectPolicy, ToolsChangedCallback, TransportFactory};
pub use session_engine::{SessionEngine, TimeoutPolicy};
pub use validator::OutputSchemaCache;
