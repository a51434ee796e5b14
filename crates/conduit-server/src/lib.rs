//! # conduit-server
//!
//! The server-role session engine for Model Context Protocol endpoints:
//! request/notification dispatch, capability negotiation, the
//! `initialize`/`notifications/initialized` handshake, timeout and
//! cancellation bookkeeping for server-initiated peer calls, and the
//! `tools`/`prompts`/`resources` registries.
//!
//! A transport (`conduit-transport`, `conduit-stdio`) owns the wire format
//! and feeds decoded [`conduit_protocol::JsonRpcRequest`]/
//! [`conduit_protocol::JsonRpcNotification`] values into a [`router::Router`];
//! this crate never touches a socket or a stream directly.

pub mod completion;
pub mod config;
pub mod error;
pub mod handler_context;
pub mod initialize;
pub mod logging;
pub mod peer;
pub mod registry;
pub mod router;
pub mod session_engine;
#[cfg(feature = "tasks")]
pub mod tasks;
pub mod validator;

pub use completion::CompletionProvider;
pub use config::{CapabilityMode, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use handler_context::{AuthInfo, HandlerContext};
pub use initialize::{InitializeState, SessionKey};
pub use logging::LogLevelSink;
#[cfg(feature = "log-reload")]
pub use logging::ReloadLogSink;
pub use peer::{NullPeerSink, PeerSink};
pub use registry::{
    ListChangedCallback, PromptHandlerFn, PromptRegistry, ResourceHandlerFn, ResourceRegistry,
    ToolHandlerFn, ToolRegistry,
};
pub use router::Router;
pub use session_engine::{SessionEngine, TimeoutPolicy};
#[cfg(feature = "tasks")]
pub use tasks::TaskLedger;
pub use validator::{JsonSchemaValidator, SchemaValidator};
