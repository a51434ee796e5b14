use crate::error::{ServerError, ServerResult};
use crate::handler_context::HandlerContext;
use crate::registry::ListChangedCallback;
use crate::validator::SchemaValidator;
use conduit_protocol::tools::CallToolResult;
use conduit_protocol::ToolDescriptor;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A tool's handler: raw JSON arguments in, a [`CallToolResult`] out. The
/// typed-DSL binding spec.md mentions (compile-derived schema) lives in
/// `conduit-macros`; a registry only ever sees this erased closure shape.
pub type ToolHandlerFn = Arc<
    dyn Fn(
            serde_json::Value,
            HandlerContext,
        ) -> Pin<Box<dyn Future<Output = ServerResult<CallToolResult>> + Send>>
        + Send
        + Sync,
>;

struct ToolEntry {
    descriptor: ToolDescriptor,
    enabled: bool,
    handler: ToolHandlerFn,
}

/// The `tools` registry: name -> (descriptor, enabled flag, handler).
pub struct ToolRegistry {
    entries: DashMap<String, ToolEntry>,
    order: Mutex<Vec<String>>,
    validator: Arc<dyn SchemaValidator>,
    on_list_changed: Mutex<Option<ListChangedCallback>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("len", &self.entries.len()).finish()
    }
}

impl ToolRegistry {
    pub fn new(validator: Arc<dyn SchemaValidator>) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(Vec::new()),
            validator,
            on_list_changed: Mutex::new(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_list_changed_callback(&self, callback: ListChangedCallback) {
        *self.on_list_changed.lock() = Some(callback);
    }

    fn notify_list_changed(&self) {
        if let Some(callback) = self.on_list_changed.lock().as_ref() {
            callback();
        }
    }

    /// Registers a new tool. Fails with [`ServerError::DuplicateRegistration`]
    /// if the name is already taken (spec.md §4.6).
    pub fn register(&self, descriptor: ToolDescriptor, handler: ToolHandlerFn) -> ServerResult<()> {
        let name = descriptor.name.clone();
        if self.entries.contains_key(&name) {
            return Err(ServerError::DuplicateRegistration(name));
        }
        self.entries.insert(name.clone(), ToolEntry { descriptor, enabled: true, handler });
        self.order.lock().push(name);
        self.notify_list_changed();
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Descriptors of every enabled tool, in registration order.
    pub fn list_enabled(&self) -> Vec<ToolDescriptor> {
        let order = self.order.lock();
        order
            .iter()
            .filter_map(|name| self.entries.get(name).filter(|e| e.enabled).map(|e| e.descriptor.clone()))
            .collect()
    }

    pub fn enable(&self, name: &str) -> ServerResult<()> {
        let mut entry = self.entries.get_mut(name).ok_or_else(|| ServerError::ToolNotFound(name.to_string()))?;
        entry.enabled = true;
        drop(entry);
        self.notify_list_changed();
        Ok(())
    }

    pub fn disable(&self, name: &str) -> ServerResult<()> {
        let mut entry = self.entries.get_mut(name).ok_or_else(|| ServerError::ToolNotFound(name.to_string()))?;
        entry.enabled = false;
        drop(entry);
        self.notify_list_changed();
        Ok(())
    }

    pub fn remove(&self, name: &str) -> ServerResult<()> {
        self.entries.remove(name).ok_or_else(|| ServerError::ToolNotFound(name.to_string()))?;
        self.order.lock().retain(|n| n != name);
        self.notify_list_changed();
        Ok(())
    }

    /// The six-step execution pipeline (spec.md §4.6): lookup, validate
    /// input, invoke, and — when the tool declares an `outputSchema` —
    /// validate `structuredContent` before returning. Decoding into a typed
    /// input shape (step 3) is the handler closure's own job; this layer
    /// only ever sees raw JSON.
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
        ctx: HandlerContext,
    ) -> ServerResult<CallToolResult> {
        let (handler, input_schema, output_schema) = {
            let entry = self.entries.get(name).ok_or_else(|| ServerError::ToolNotFound(name.to_string()))?;
            if !entry.enabled {
                return Err(ServerError::ToolDisabled(name.to_string()));
            }
            (Arc::clone(&entry.handler), entry.descriptor.input_schema.clone(), entry.descriptor.output_schema.clone())
        };

        self.validator.validate(&input_schema, &arguments)?;
        let result = handler(arguments, ctx).await?;

        if let Some(output_schema) = output_schema
            && let Some(structured) = &result.structured_content
        {
            self.validator.validate(&output_schema, structured)?;
        }

        Ok(result)
    }
}
