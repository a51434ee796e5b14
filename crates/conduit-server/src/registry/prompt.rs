use crate::error::{ServerError, ServerResult};
use crate::handler_context::HandlerContext;
use crate::registry::ListChangedCallback;
use conduit_protocol::prompts::GetPromptResult;
use conduit_protocol::PromptDescriptor;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A prompt's handler: the caller's named arguments in, a filled-in message
/// list out.
pub type PromptHandlerFn = Arc<
    dyn Fn(
            BTreeMap<String, String>,
            HandlerContext,
        ) -> Pin<Box<dyn Future<Output = ServerResult<GetPromptResult>> + Send>>
        + Send
        + Sync,
>;

struct PromptEntry {
    descriptor: PromptDescriptor,
    enabled: bool,
    handler: PromptHandlerFn,
}

/// The `prompts` registry. Unlike tools, arguments are checked for presence
/// against the descriptor's `required` flags rather than a JSON Schema —
/// prompt arguments are always strings (spec.md §3 data model).
pub struct PromptRegistry {
    entries: DashMap<String, PromptEntry>,
    order: Mutex<Vec<String>>,
    on_list_changed: Mutex<Option<ListChangedCallback>>,
}

impl std::fmt::Debug for PromptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptRegistry").field("len", &self.entries.len()).finish()
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self { entries: DashMap::new(), order: Mutex::new(Vec::new()), on_list_changed: Mutex::new(None) }
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

    pub fn register(&self, descriptor: PromptDescriptor, handler: PromptHandlerFn) -> ServerResult<()> {
        let name = descriptor.name.clone();
        if self.entries.contains_key(&name) {
            return Err(ServerError::DuplicateRegistration(name));
        }
        self.entries.insert(name.clone(), PromptEntry { descriptor, enabled: true, handler });
        self.order.lock().push(name);
        self.notify_list_changed();
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn list_enabled(&self) -> Vec<PromptDescriptor> {
        let order = self.order.lock();
        order
            .iter()
            .filter_map(|name| self.entries.get(name).filter(|e| e.enabled).map(|e| e.descriptor.clone()))
            .collect()
    }

    pub fn enable(&self, name: &str) -> ServerResult<()> {
        let mut entry = self.entries.get_mut(name).ok_or_else(|| ServerError::PromptNotFound(name.to_string()))?;
        entry.enabled = true;
        drop(entry);
        self.notify_list_changed();
        Ok(())
    }

    pub fn disable(&self, name: &str) -> ServerResult<()> {
        let mut entry = self.entries.get_mut(name).ok_or_else(|| ServerError::PromptNotFound(name.to_string()))?;
        entry.enabled = false;
        drop(entry);
        self.notify_list_changed();
        Ok(())
    }

    pub fn remove(&self, name: &str) -> ServerResult<()> {
        self.entries.remove(name).ok_or_else(|| ServerError::PromptNotFound(name.to_string()))?;
        self.order.lock().retain(|n| n != name);
        self.notify_list_changed();
        Ok(())
    }

    pub async fn execute(
        &self,
        name: &str,
        arguments: BTreeMap<String, String>,
        ctx: HandlerContext,
    ) -> ServerResult<GetPromptResult> {
        let (handler, required) = {
            let entry = self.entries.get(name).ok_or_else(|| ServerError::PromptNotFound(name.to_string()))?;
            if !entry.enabled {
                return Err(ServerError::PromptDisabled(name.to_string()));
            }
            let required: Vec<String> = entry
                .descriptor
                .arguments
                .iter()
                .filter(|a| a.required)
                .map(|a| a.name.clone())
                .collect();
            (Arc::clone(&entry.handler), required)
        };

        let missing: Vec<&str> =
            required.iter().filter(|name| !arguments.contains_key(*name)).map(String::as_str).collect();
        if !missing.is_empty() {
            return Err(ServerError::ValidationFailed(format!(
                "missing required argument(s): {}",
                missing.join(", ")
            )));
        }

        handler(arguments, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_protocol::prompts::{PromptMessage, PromptRole};
    use conduit_protocol::{ClientCapabilities, Content, PromptArgument};

    fn descriptor() -> PromptDescriptor {
        PromptDescriptor {
            name: "greeting".into(),
            description: None,
            arguments: vec![PromptArgument { name: "name".into(), description: None, required: true }],
        }
    }

    fn handler() -> PromptHandlerFn {
        Arc::new(|args, _ctx| {
            Box::pin(async move {
                let name = args.get("name").cloned().unwrap_or_default();
                Ok(GetPromptResult {
                    description: None,
                    messages: vec![PromptMessage { role: PromptRole::User, content: Content::text(name) }],
                })
            })
        })
    }

    fn ctx() -> HandlerContext {
        HandlerContext::new(1.into(), ClientCapabilities::default())
    }

    #[tokio::test]
    async fn execute_rejects_missing_required_arguments() {
        let registry = PromptRegistry::new();
        registry.register(descriptor(), handler()).unwrap();
        let err = registry.execute("greeting", BTreeMap::new(), ctx()).await.unwrap_err();
        assert!(matches!(err, ServerError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn execute_runs_the_handler_when_required_arguments_present() {
        let registry = PromptRegistry::new();
        registry.register(descriptor(), handler()).unwrap();
        let mut args = BTreeMap::new();
        args.insert("name".to_string(), "Ada".to_string());
        let result = registry.execute("greeting", args, ctx()).await.unwrap();
        assert_eq!(result.messages.len(), 1);
    }

    #[tokio::test]
    async fn execute_rejects_a_disabled_prompt() {
        let registry = PromptRegistry::new();
        registry.register(descriptor(), handler()).unwrap();
        registry.disable("greeting").unwrap();
        let mut args = BTreeMap::new();
        args.insert("name".to_string(), "Ada".to_string());
        let err = registry.execute("greeting", args, ctx()).await.unwrap_err();
        assert!(matches!(err, ServerError::PromptDisabled(_)));
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let registry = PromptRegistry::new();
        registry.register(descriptor(), handler()).unwrap();
        let err = registry.register(descriptor(), handler()).unwrap_err();
        assert!(matches!(err, ServerError::DuplicateRegistration(_)));
    }
}
