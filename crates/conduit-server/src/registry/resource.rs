use crate::error::{ServerError, ServerResult};
use crate::handler_context::HandlerContext;
use crate::registry::ListChangedCallback;
use conduit_protocol::resources::ReadResourceResult;
use conduit_protocol::{ResourceDescriptor, ResourceTemplateDescriptor};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A resource's handler: no arguments beyond the URI itself, just the
/// context (spec.md §3 data model — resources are read, not called with
/// parameters).
pub type ResourceHandlerFn = Arc<
    dyn Fn(HandlerContext) -> Pin<Box<dyn Future<Output = ServerResult<ReadResourceResult>> + Send>>
        + Send
        + Sync,
>;

struct ResourceEntry {
    descriptor: ResourceDescriptor,
    enabled: bool,
    handler: ResourceHandlerFn,
}

/// The `resources` registry, keyed by URI rather than a bare name. No
/// argument validation: `resources/read` carries only the URI.
pub struct ResourceRegistry {
    entries: DashMap<String, ResourceEntry>,
    order: Mutex<Vec<String>>,
    templates: Mutex<Vec<ResourceTemplateDescriptor>>,
    on_list_changed: Mutex<Option<ListChangedCallback>>,
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry").field("len", &self.entries.len()).finish()
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(Vec::new()),
            templates: Mutex::new(Vec::new()),
            on_list_changed: Mutex::new(None),
        }
    }

    /// Registers a URI-templated family of resources (spec.md §3
    /// `resources/templates/list`). Templates carry no handler of their
    /// own — `resources/read` is always served by a concrete URI's entry
    /// once the peer substitutes the template's variables.
    pub fn register_template(&self, template: ResourceTemplateDescriptor) {
        self.templates.lock().push(template);
        self.notify_list_changed();
    }

    pub fn list_templates(&self) -> Vec<ResourceTemplateDescriptor> {
        self.templates.lock().clone()
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

    pub fn register(&self, descriptor: ResourceDescriptor, handler: ResourceHandlerFn) -> ServerResult<()> {
        let uri = descriptor.uri.clone();
        if self.entries.contains_key(&uri) {
            return Err(ServerError::DuplicateRegistration(uri));
        }
        self.entries.insert(uri.clone(), ResourceEntry { descriptor, enabled: true, handler });
        self.order.lock().push(uri);
        self.notify_list_changed();
        Ok(())
    }

    pub fn has(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }

    pub fn list_enabled(&self) -> Vec<ResourceDescriptor> {
        let order = self.order.lock();
        order
            .iter()
            .filter_map(|uri| self.entries.get(uri).filter(|e| e.enabled).map(|e| e.descriptor.clone()))
            .collect()
    }

    pub fn enable(&self, uri: &str) -> ServerResult<()> {
        let mut entry = self.entries.get_mut(uri).ok_or_else(|| ServerError::ResourceNotFound(uri.to_string()))?;
        entry.enabled = true;
        drop(entry);
        self.notify_list_changed();
        Ok(())
    }

    pub fn disable(&self, uri: &str) -> ServerResult<()> {
        let mut entry = self.entries.get_mut(uri).ok_or_else(|| ServerError::ResourceNotFound(uri.to_string()))?;
        entry.enabled = false;
        drop(entry);
        self.notify_list_changed();
        Ok(())
    }

    pub fn remove(&self, uri: &str) -> ServerResult<()> {
        self.entries.remove(uri).ok_or_else(|| ServerError::ResourceNotFound(uri.to_string()))?;
        self.order.lock().retain(|u| u != uri);
        self.notify_list_changed();
        Ok(())
    }

    pub async fn execute(&self, uri: &str, ctx: HandlerContext) -> ServerResult<ReadResourceResult> {
        let handler = {
            let entry = self.entries.get(uri).ok_or_else(|| ServerError::ResourceNotFound(uri.to_string()))?;
            if !entry.enabled {
                return Err(ServerError::ResourceDisabled(uri.to_string()));
            }
            Arc::clone(&entry.handler)
        };
        handler(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_protocol::{ClientCapabilities, Content};

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor {
            uri: "file:///readme.md".into(),
            name: "readme".into(),
            description: None,
            mime_type: Some("text/markdown".into()),
        }
    }

    fn handler() -> ResourceHandlerFn {
        Arc::new(|_ctx| Box::pin(async move { Ok(ReadResourceResult { contents: vec![Content::text("hi")] }) }))
    }

    fn ctx() -> HandlerContext {
        HandlerContext::new(1.into(), ClientCapabilities::default())
    }

    #[tokio::test]
    async fn execute_reads_a_registered_resource() {
        let registry = ResourceRegistry::new();
        registry.register(descriptor(), handler()).unwrap();
        let result = registry.execute("file:///readme.md", ctx()).await.unwrap();
        assert_eq!(result.contents.len(), 1);
    }

    #[tokio::test]
    async fn execute_rejects_an_unknown_uri() {
        let registry = ResourceRegistry::new();
        let err = registry.execute("file:///missing.md", ctx()).await.unwrap_err();
        assert!(matches!(err, ServerError::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn execute_rejects_a_disabled_resource() {
        let registry = ResourceRegistry::new();
        registry.register(descriptor(), handler()).unwrap();
        registry.disable("file:///readme.md").unwrap();
        let err = registry.execute("file:///readme.md", ctx()).await.unwrap_err();
        assert!(matches!(err, ServerError::ResourceDisabled(_)));
    }

    #[test]
    fn registered_templates_are_listed_back() {
        let registry = ResourceRegistry::new();
        registry.register_template(ResourceTemplateDescriptor {
            uri_template: "file:///{path}".into(),
            name: "file".into(),
            description: None,
            mime_type: None,
        });
        assert_eq!(registry.list_templates().len(), 1);
    }

    #[test]
    fn register_rejects_duplicate_uris() {
        let registry = ResourceRegistry::new();
        registry.register(descriptor(), handler()).unwrap();
        let err = registry.register(descriptor(), handler()).unwrap_err();
        assert!(matches!(err, ServerError::DuplicateRegistration(_)));
    }
}
