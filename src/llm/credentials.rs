//! Watchable credential cell.

use std::sync::Arc;
use tokio::sync::watch;

/// The current generation-service credential, observable for changes.
///
/// Cloning shares the same cell. Publishing a value notifies every
/// subscriber, which is how failed regenerations learn that a key arrived.
#[derive(Debug, Clone)]
pub struct Credentials {
    sender: Arc<watch::Sender<Option<String>>>,
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Credentials {
    #[must_use]
    pub fn new(initial: Option<String>) -> Self {
        let (sender, _) = watch::channel(normalize(initial));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish a new credential. Blank values count as no credential.
    pub fn set(&self, credential: Option<String>) {
        let credential = normalize(credential);
        tracing::debug!(
            "Credential {}",
            if credential.is_some() { "published" } else { "cleared" }
        );
        self.sender.send_replace(credential);
    }

    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.sender.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.sender.subscribe()
    }
}

fn normalize(credential: Option<String>) -> Option<String> {
    credential.filter(|key| !key.trim().is_empty())
}
