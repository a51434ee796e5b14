//! The JSON-RPC 2.0 envelope and the typed request/result shapes for every
//! MCP method.
//!
//! [`envelope`] carries the wire-level Request/Response/Notification/Batch
//! shapes and `RequestId`; [`methods`] names every method string this SDK
//! knows about; the per-subsystem modules (`initialize`, `tools`,
//! `resources`, `prompts`, `completion`, `logging`, `sampling`,
//! `elicitation`, `roots`, `tasks`, `progress`) hold the typed params/result
//! pairs.

pub mod envelope;
pub mod meta;
pub mod methods;

pub mod completion;
pub mod elicitation;
pub mod initialize;
pub mod logging;
pub mod progress;
pub mod prompts;
pub mod resources;
pub mod roots;
pub mod sampling;
#[cfg(feature = "tasks")]
pub mod tasks;
pub mod tools;

pub use conduit_core::{Error, ErrorKind, Result};
pub use conduit_types::*;
pub use envelope::{
    JsonRpcBatch, JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, JsonRpcResponsePayload, JsonRpcVersion, RequestId,
};
pub use meta::RequestMeta;
