//! Seam for attaching bearer-token authentication to the transport without
//! this crate depending on how the token is obtained or refreshed.
//!
//! `conduit-auth`'s OAuth client implements this trait; tests and callers
//! with a static token can use [`StaticToken`].

use std::sync::Arc;

use async_trait::async_trait;

/// Supplies the bearer token for outgoing requests and is told when the
/// server rejected one with `401`/`403`, so it can refresh before the
/// transport retries.
#[async_trait]
pub trait TokenSource: Send + Sync + std::fmt::Debug {
    /// The token to send on the `Authorization` header, if any.
    async fn token(&self) -> Option<String>;

    /// Called once after a `401`/`403` response, before the request is
    /// retried a single time. Implementations that can refresh (e.g. via a
    /// stored refresh token) should do so here; a source with nothing to
    /// refresh can make this a no-op.
    async fn refresh(&self) {}
}

/// A [`TokenSource`] that always returns the same token; `refresh` is a
/// no-op since there is nothing to refresh.
#[derive(Debug, Clone)]
pub struct StaticToken(Arc<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Arc::new(token.into()))
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Option<String> {
        Some((*self.0).clone())
    }
}
