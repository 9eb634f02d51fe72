//! Snippet persistence.
//!
//! The engine only needs four operations from a store, captured by
//! [`SnippetStore`]. Two adapters ship with the crate:
//!
//! - [`MemoryStore`] keeps snippets in memory, for tests and embedding
//! - [`JsonFileStore`] keeps one JSON document on disk and is what the CLI uses
//!
//! Both enforce the same record rules on write: literal snippets are never
//! dirty and carry no generation error, and `updatedAt` never moves backwards.

mod json;
mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::{Snippet, SnippetPatch, StoreError};

pub use json::JsonFileStore;
pub use memory::MemoryStore;

/// Storage for the authoritative snippet collection.
#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Every stored snippet, in insertion order.
    async fn load_all(&self) -> Result<Vec<Snippet>, StoreError>;

    /// Insert `snippet`, or replace the stored snippet with the same id.
    async fn save(&self, snippet: &Snippet) -> Result<Snippet, StoreError>;

    /// Remove the snippet with `id`.
    async fn delete(&self, id: Uuid) -> Result<Snippet, StoreError>;

    /// Apply `patch` to the snippet with `id` and return the updated record.
    async fn update_property(&self, id: Uuid, patch: &SnippetPatch)
    -> Result<Snippet, StoreError>;
}

/// Upsert `snippet` into `snippets` and return the stored record.
pub(crate) fn upsert(snippets: &mut Vec<Snippet>, snippet: &Snippet) -> Snippet {
    let mut stored = snippet.clone();
    stored.normalize();

    match snippets.iter_mut().find(|existing| existing.id == stored.id) {
        Some(existing) => {
            if stored.updated_at < existing.updated_at {
                stored.updated_at = existing.updated_at;
            }
            stored.touch();
            *existing = stored.clone();
        }
        None => snippets.push(stored.clone()),
    }
    stored
}

pub(crate) fn remove(snippets: &mut Vec<Snippet>, id: Uuid) -> Result<Snippet, StoreError> {
    let index = snippets.iter().position(|s| s.id == id).ok_or(StoreError::NotFound {
        id,
    })?;
    Ok(snippets.remove(index))
}

pub(crate) fn patch(
    snippets: &mut [Snippet],
    id: Uuid,
    patch: &SnippetPatch,
) -> Result<Snippet, StoreError> {
    let snippet = snippets.iter_mut().find(|s| s.id == id).ok_or(StoreError::NotFound {
        id,
    })?;
    snippet.apply(patch);
    Ok(snippet.clone())
}
