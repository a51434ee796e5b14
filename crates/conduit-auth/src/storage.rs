//! Pluggable token storage: where a provider persists its cached
//! [`TokenSet`] between calls. Ships an in-memory backend; applications
//! supply their own (keychain, encrypted file, database) by implementing
//! [`TokenStorage`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{AuthError, AuthResult};
use crate::types::TokenSet;

/// Where a provider's cached tokens live. Keyed by an application-chosen
/// identifier (typically the authorization server's issuer URL), so one
/// backend can serve multiple providers.
#[async_trait]
pub trait TokenStorage: Send + Sync + std::fmt::Debug {
    async fn load(&self, key: &str) -> AuthResult<Option<TokenSet>>;
    async fn store(&self, key: &str, tokens: TokenSet) -> AuthResult<()>;
    async fn clear(&self, key: &str) -> AuthResult<()>;
}

/// The default backend: tokens live only as long as the process does.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTokenStorage {
    tokens: Arc<Mutex<HashMap<String, TokenSet>>>,
}

impl InMemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStorage for InMemoryTokenStorage {
    async fn load(&self, key: &str) -> AuthResult<Option<TokenSet>> {
        Ok(self.tokens.lock().expect("token storage mutex is never poisoned").get(key).cloned())
    }

    async fn store(&self, key: &str, tokens: TokenSet) -> AuthResult<()> {
        self.tokens.lock().expect("token storage mutex is never poisoned").insert(key.to_string(), tokens);
        Ok(())
    }

    async fn clear(&self, key: &str) -> AuthResult<()> {
        self.tokens.lock().expect("token storage mutex is never poisoned").remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn in_memory_storage_roundtrips() {
        let storage = InMemoryTokenStorage::new();
        assert!(storage.load("issuer").await.unwrap().is_none());

        let set = TokenSet::new("access".to_string(), Some(Duration::from_secs(60)));
        storage.store("issuer", set).await.unwrap();
        let loaded = storage.load("issuer").await.unwrap().unwrap();
        assert_eq!(loaded.access_token(), "access");

        storage.clear("issuer").await.unwrap();
        assert!(storage.load("issuer").await.unwrap().is_none());
    }
}
