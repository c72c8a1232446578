//! Persistent store for generated invoice PDFs.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Key under which an invoice PDF is stored.
pub fn artifact_key(uuid: &str) -> String {
    format!("invoice_{}.pdf", uuid)
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn save(&self, key: &str, data: &[u8]) -> Result<(), String>;
}

/// Writes artifacts into a local directory, created on first use.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an artifact. The key is sanitized so it cannot leave `root`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(sanitize_filename::sanitize(key))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn save(&self, key: &str, data: &[u8]) -> Result<(), String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| format!("Failed to create {}: {}", self.root.display(), e))?;

        let path = self.path_for(key);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
    }
}
