//! Artifact persistence
//!
//! Generated files are kept under `<root>/<owner>/<file>`, where the owner is
//! the job's resource id, or the job id when no resource is linked.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Writes `content` to `file_name` under `owner` and returns its path
    async fn save(&self, owner: &str, file_name: &str, content: &str) -> Result<PathBuf>;

    /// Directory that holds every artifact of `owner`
    fn location(&self, owner: &str) -> PathBuf;
}

/// Filesystem-backed [`ArtifactStore`]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn save(&self, owner: &str, file_name: &str, content: &str) -> Result<PathBuf> {
        let dir = self.location(owner);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create artifact directory {}", dir.display()))?;

        let path = dir.join(sanitize(file_name));
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write artifact {}", path.display()))?;

        info!(owner = %owner, file = %file_name, size = content.len(), "Saved artifact");
        Ok(path)
    }

    fn location(&self, owner: &str) -> PathBuf {
        self.root.join(sanitize(owner))
    }
}

/// Keeps a path component inside its parent directory
fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_writes_under_owner() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(root.path());

        let path = store.save("res-1", "main.tf", "terraform {}").await.unwrap();

        assert_eq!(path, root.path().join("res-1").join("main.tf"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "terraform {}");
        assert_eq!(store.location("res-1"), root.path().join("res-1"));
    }

    #[tokio::test]
    async fn test_owner_cannot_escape_root() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(root.path());

        let path = store.save("..", "../../etc/passwd", "x").await.unwrap();

        assert!(path.starts_with(root.path()));
        assert_eq!(path, root.path().join("_").join(".._.._etc_passwd"));
    }
}
