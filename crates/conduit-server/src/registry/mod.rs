//! Name-keyed tool/prompt/resource registries (spec.md §4.6): `register`,
//! `has`, `list_enabled`, `enable`, `disable`, `remove`, `execute`.

pub mod prompt;
pub mod resource;
pub mod tool;

pub use prompt::{PromptHandlerFn, PromptRegistry};
pub use resource::{ResourceHandlerFn, ResourceRegistry};
pub use tool::{ToolHandlerFn, ToolRegistry};

use std::sync::Arc;

/// Invoked after a mutation that should surface to the peer as
/// `notifications/{tools,prompts,resources}/list_changed`. The router wires
/// one of these per registry to a [`crate::peer::PeerSink`].
pub type ListChangedCallback = Arc<dyn Fn() + Send + Sync>;
