//! Generic per-method handler registration (spec.md §4.1
//! `register_request_handler`/`register_notification_handler`): the
//! session engine dispatches server-initiated requests
//! (`sampling/createMessage`, `elicitation/create`, `roots/list`) and
//! notifications (`notifications/*/list_changed`, `notifications/message`,
//! `notifications/progress`, `notifications/resources/updated`) to whatever
//! the application installed, by method name. Mirrors
//! `conduit-server::registry`'s closure-erasure style (`ToolHandlerFn`
//! etc.) generalized to arbitrary methods instead of one per registry kind.

use crate::error::ClientError;
use conduit_protocol::envelope::{JsonRpcNotification, JsonRpcRequest};
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A handler for a server-initiated request: raw JSON params in, a raw JSON
/// result out. Typed wrappers (`sampling::CreateMessageParams`, etc.) live
/// at the call site; the registry only ever sees this erased shape.
pub type RequestHandlerFn = Arc<
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ClientError>> + Send>>
        + Send
        + Sync,
>;

/// A handler for a notification the server sent. Multiple handlers may be
/// registered per method; all are invoked, off the receive loop.
pub type NotificationHandlerFn = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

#[derive(Default)]
pub struct HandlerRegistry {
    requests: DashMap<String, RequestHandlerFn>,
    notifications: DashMap<String, Vec<NotificationHandlerFn>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("request_methods", &self.requests.iter().map(|e| e.key().clone()).collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the handler invoked when the server sends `method` as a
    /// request. A second registration for the same method replaces the
    /// first, matching `conduit-server`'s registry semantics for mutation
    /// operations.
    pub fn register_request_handler(&self, method: impl Into<String>, handler: RequestHandlerFn) {
        self.requests.insert(method.into(), handler);
    }

    /// Installs a handler invoked when the server sends `method` as a
    /// notification; multiple handlers may be registered for the same
    /// method and all of them run.
    pub fn register_notification_handler(&self, method: impl Into<String>, handler: NotificationHandlerFn) {
        self.notifications.entry(method.into()).or_default().push(handler);
    }

    pub fn request_handler(&self, method: &str) -> Option<RequestHandlerFn> {
        self.requests.get(method).map(|entry| Arc::clone(&entry))
    }

    pub fn notification_handlers(&self, method: &str) -> Vec<NotificationHandlerFn> {
        self.notifications.get(method).map(|entry| entry.clone()).unwrap_or_default()
    }

    /// Dispatches an inbound server-initiated request to its registered
    /// handler, or *method-not-found* if none was installed.
    pub async fn dispatch_request(&self, request: &JsonRpcRequest) -> Result<serde_json::Value, ClientError> {
        let handler = self
            .request_handler(&request.method)
            .ok_or_else(|| ClientError::MethodNotFound(request.method.clone()))?;
        handler(request.params.clone().unwrap_or(serde_json::Value::Null)).await
    }

    /// Runs every handler registered for an inbound notification's method;
    /// a notification nobody subscribed to is silently dropped.
    pub fn dispatch_notification(&self, notification: &JsonRpcNotification) {
        for handler in self.notification_handlers(&notification.method) {
            handler(notification.params.clone().unwrap_or(serde_json::Value::Null));
        }
    }
}
