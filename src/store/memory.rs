//! In-memory snippet store.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::SnippetStore;
use crate::core::{Snippet, SnippetPatch, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    snippets: RwLock<Vec<Snippet>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `snippets` already stored, normalized as if each was saved.
    #[must_use]
    pub fn with_snippets(snippets: Vec<Snippet>) -> Self {
        let mut stored = Vec::with_capacity(snippets.len());
        for snippet in &snippets {
            super::upsert(&mut stored, snippet);
        }
        Self {
            snippets: RwLock::new(stored),
        }
    }
}

#[async_trait]
impl SnippetStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<Snippet>, StoreError> {
        Ok(self.snippets.read().await.clone())
    }

    async fn save(&self, snippet: &Snippet) -> Result<Snippet, StoreError> {
        Ok(super::upsert(&mut *self.snippets.write().await, snippet))
    }

    async fn delete(&self, id: Uuid) -> Result<Snippet, StoreError> {
        super::remove(&mut *self.snippets.write().await, id)
    }

    async fn update_property(
        &self,
        id: Uuid,
        patch: &SnippetPatch,
    ) -> Result<Snippet, StoreError> {
        super::patch(&mut *self.snippets.write().await, id, patch)
    }
}
