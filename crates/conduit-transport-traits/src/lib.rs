//! Transport-agnostic traits and types shared by every conduit transport
//! implementation (stdio, streamable HTTP client and server).
//!
//! This crate defines the seam: [`Transport`] and [`BidirectionalTransport`]
//! are the abstractions the session engine is written against, so it never
//! has to know whether it's driving a child process over stdio or a
//! streamable HTTP endpoint.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

mod config;
mod error;
mod message;
mod session;
mod traits;
mod types;

pub use config::{LimitsConfig, TimeoutConfig};
pub use error::{validate_request_size, validate_response_size, TransportError, TransportResult};
pub use message::{TransportMessage, TransportMessageMetadata};
pub use session::{SessionId, MAX_SESSION_ID_LEN};
pub use traits::{BidirectionalTransport, Transport};
pub use types::{TransportCapabilities, TransportConfig, TransportState, TransportType};
