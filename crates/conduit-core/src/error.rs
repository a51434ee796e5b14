use crate::kind::ErrorKind;
use std::collections::BTreeMap;
use std::fmt;

/// Structured context attached to every [`Error`]: the operation and
/// component that raised it, plus open-ended annotations useful in a
/// tracing span (session id, request id, method name, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    pub operation: Option<String>,
    pub component: Option<String>,
    pub annotations: BTreeMap<String, String>,
}

/// The conduit error type. A struct rather than a bare enum: every error
/// carries an id for cross-log correlation, a classification (`kind`), a
/// human message, structured context, an optional chained source, and (in
/// debug builds) the backtrace captured at construction.
pub struct Error {
    id: uuid::Uuid,
    kind: ErrorKind,
    message: String,
    context: ErrorContext,
    source: Option<Box<Error>>,
    #[cfg(debug_assertions)]
    backtrace: std::backtrace::Backtrace,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            kind,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
            #[cfg(debug_assertions)]
            backtrace: std::backtrace::Backtrace::capture(),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, message)
    }
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }
    pub fn method_not_found(method: impl Into<String>) -> Self {
        let method = method.into();
        Self::new(ErrorKind::MethodNotFound, format!("method not found: {method}"))
    }
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }
    pub fn resource_not_found(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self::new(ErrorKind::ResourceNotFound, format!("resource not found: {uri}"))
            .with_annotation("uri", uri)
    }
    pub fn connection_closed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionClosed, message)
    }
    pub fn request_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestTimeout, message)
    }
    pub fn transport_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransportError, message)
    }
    pub fn request_cancelled(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestCancelled, reason)
    }
    pub fn session_expired(session_id: impl Into<String>) -> Self {
        let id = session_id.into();
        Self::new(ErrorKind::SessionExpired, format!("session expired: {id}"))
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.context.component = Some(component.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_source(mut self, source: Error) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
    pub fn message(&self) -> &str {
        &self.message
    }
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// The backtrace captured when this error was constructed. Only
    /// populated in debug builds, matching the donor's `cfg(debug_assertions)`
    /// gate — capturing one in release builds is needless overhead on a hot
    /// error path.
    #[cfg(debug_assertions)]
    pub fn backtrace(&self) -> &std::backtrace::Backtrace {
        &self.backtrace
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Error");
        debug
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("context", &self.context)
            .field("source", &self.source);
        #[cfg(debug_assertions)]
        debug.field("backtrace", &self.backtrace);
        debug.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(op) = &self.context.operation {
            write!(f, " (during {op})")?;
        }
        Ok(())
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            message: self.message.clone(),
            context: self.context.clone(),
            source: self.source.clone(),
            #[cfg(debug_assertions)]
            backtrace: std::backtrace::Backtrace::capture(),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}
