//! Everything a typical server or client program needs from one `use`.

pub use conduit_core::{Error, ErrorKind, Result};
pub use conduit_macros::{prompt, resource, server, tool};
pub use conduit_protocol::{
    Content, Implementation, PromptArgument, PromptDescriptor, ResourceDescriptor, ToolDescriptor,
};
pub use conduit_server::{HandlerContext, Router, ServerConfig, ServerError, ServerResult};

#[cfg(feature = "stdio")]
pub use crate::stdio_server;

#[cfg(feature = "http")]
pub use crate::http_server;

#[cfg(feature = "client")]
pub use crate::connect::*;

#[cfg(feature = "client")]
pub use conduit_client::{Client, ClientConfig};
