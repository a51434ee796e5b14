//! Shared MCP domain types: protocol version, capability trees, content
//! blocks, and the descriptors for tools, prompts, and resources.
//!
//! These are the nouns every method in `conduit-protocol` is built from; they
//! carry no JSON-RPC envelope logic of their own.

mod capabilities;
mod content;
mod descriptors;
mod implementation;
mod version;

pub use capabilities::{ClientCapabilities, ElicitationCapability, ResourcesCapability, RootsCapability, ServerCapabilities};
pub use content::{Annotations, Content};
pub use descriptors::{PromptArgument, PromptDescriptor, ResourceDescriptor, ResourceTemplateDescriptor, ToolDescriptor};
pub use implementation::Implementation;
pub use version::ProtocolVersion;
