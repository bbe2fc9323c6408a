//! The single process-wide document slot.
//!
//! Every client shares one slot: an upload replaces whatever was loaded
//! before, and queries read whatever was committed last. Readers take an
//! `Arc` snapshot, so a query never observes a half-replaced document.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A successfully uploaded and extracted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub filename: String,
    pub stored_path: PathBuf,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct DocumentSession {
    current: RwLock<Option<Arc<LoadedDocument>>>,
}

impl DocumentSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the loaded document unconditionally.
    pub async fn set(&self, document: LoadedDocument) {
        let mut current = self.current.write().await;
        *current = Some(Arc::new(document));
    }

    /// The most recently committed document, if any upload has succeeded.
    pub async fn get(&self) -> Option<Arc<LoadedDocument>> {
        self.current.read().await.clone()
    }
}
