//! Snippet store backed by a single JSON document.
//!
//! The document is rewritten in full on every mutation: serialized to a
//! temporary file in the same directory, synced, then renamed over the old
//! document so readers never observe a partial write. A missing file is an
//! empty collection.
//!
//! ```json
//! {
//!   "snippets": [
//!     { "id": "…", "name": "greeting", "content": "Hello", "isGenerated": false, … }
//!   ]
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::SnippetStore;
use crate::core::{Snippet, SnippetPatch, StoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    snippets: Vec<Snippet>,
}

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<StoreDocument, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No snippet store at {}, starting empty", self.path.display());
                return Ok(StoreDocument::default());
            }
            Err(e) => return Err(self.io_error(&e)),
        };

        if content.trim().is_empty() {
            return Ok(StoreDocument::default());
        }
        serde_json::from_str(&content).map_err(|e| StoreError::Serialization {
            message: format!("{}: {e}", self.path.display()),
        })
    }

    async fn write_document(&self, document: &StoreDocument) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(document).map_err(|e| StoreError::Serialization {
            message: e.to_string(),
        })?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_write(&path, &content))
            .await
            .map_err(|e| StoreError::Io {
                path: self.path.display().to_string(),
                message: format!("write task failed: {e}"),
            })??;

        tracing::debug!(
            "Wrote {} snippet(s) to {}",
            document.snippets.len(),
            self.path.display()
        );
        Ok(())
    }

    async fn modify<T>(
        &self,
        change: impl FnOnce(&mut Vec<Snippet>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        let result = change(&mut document.snippets)?;
        self.write_document(&document).await?;
        Ok(result)
    }

    fn io_error(&self, error: &std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            message: error.to_string(),
        }
    }
}

fn atomic_write(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let io_error = |e: std::io::Error| StoreError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(io_error)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_error)?;
    temp.write_all(content).map_err(io_error)?;
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}

#[async_trait]
impl SnippetStore for JsonFileStore {
    async fn load_all(&self) -> Result<Vec<Snippet>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_document().await?.snippets)
    }

    async fn save(&self, snippet: &Snippet) -> Result<Snippet, StoreError> {
        self.modify(|snippets| Ok(super::upsert(snippets, snippet))).await
    }

    async fn delete(&self, id: Uuid) -> Result<Snippet, StoreError> {
        self.modify(|snippets| super::remove(snippets, id)).await
    }

    async fn update_property(
        &self,
        id: Uuid,
        patch: &SnippetPatch,
    ) -> Result<Snippet, StoreError> {
        self.modify(|snippets| super::patch(snippets, id, patch)).await
    }
}
