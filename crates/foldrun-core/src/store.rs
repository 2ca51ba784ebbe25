//! Storage handles for the models, inputs and results volumes.
//!
//! Every artifact is addressed by a relative, `/`-separated key. Components
//! receive an `Arc<dyn ArtifactStore>` instead of reaching for global paths,
//! so the same code runs against a local directory or a mounted shared volume.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{FoldError, Result};

pub type ArtifactWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Read/write capability over a namespaced key space.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Filesystem location backing `key`.
    fn locate(&self, key: &str) -> Result<PathBuf>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Write `bytes` to `key`, creating parent directories as needed.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<PathBuf>;

    /// Open a streaming writer for `key`, truncating any previous content.
    async fn create(&self, key: &str) -> Result<ArtifactWriter>;

    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Make everything written so far visible to other consumers of the volume.
    async fn commit(&self) -> Result<()>;
}

/// Reject keys that would escape the store root.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(FoldError::Store("empty key".to_string()));
    }
    let path = Path::new(key);
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(FoldError::Store(format!(
                    "key {key:?} must be a relative path without '..'"
                )))
            }
        }
    }
    Ok(())
}

/// Store rooted at a local directory.
pub struct LocalStore {
    root: PathBuf,
    pending: Mutex<Vec<PathBuf>>,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn prepare(&self, key: &str) -> Result<PathBuf> {
        let path = self.locate(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        self.pending.lock().await.push(path.clone());
        Ok(path)
    }
}

#[async_trait]
impl ArtifactStore for LocalStore {
    fn locate(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.locate(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.locate(key)?;
        Ok(fs::read(&path).await?)
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.prepare(key).await?;
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    async fn create(&self, key: &str) -> Result<ArtifactWriter> {
        let path = self.prepare(key).await?;
        let file = fs::File::create(&path).await?;
        Ok(Box::new(file))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let src = self.locate(from)?;
        let dst = self.prepare(to).await?;
        fs::rename(&src, &dst).await?;
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut pending = self.pending.lock().await;
        let mut synced = 0usize;
        for path in pending.drain(..) {
            // Renamed-away temporaries no longer exist.
            if !fs::try_exists(&path).await? {
                continue;
            }
            fs::File::open(&path).await?.sync_all().await?;
            synced += 1;
        }
        debug!(root = %self.root.display(), synced, "Committed store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_validate_key_rejects_traversal() {
        assert!(validate_key("score/a.npz").is_ok());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("a/../../b").is_err());
        assert!(validate_key("").is_err());
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let path = store.write("molecules/x.cif", b"data_x").await.unwrap();
        assert_eq!(path, dir.path().join("molecules/x.cif"));
        assert!(store.exists("molecules/x.cif").await.unwrap());
        assert_eq!(store.read("molecules/x.cif").await.unwrap(), b"data_x");
    }

    #[tokio::test]
    async fn test_streaming_writer_and_rename() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let mut writer = store.create("models_v2/trunk.pt.part").await.unwrap();
        writer.write_all(b"weights").await.unwrap();
        writer.shutdown().await.unwrap();
        drop(writer);

        store.rename("models_v2/trunk.pt.part", "models_v2/trunk.pt").await.unwrap();
        assert!(!store.exists("models_v2/trunk.pt.part").await.unwrap());
        assert_eq!(store.read("models_v2/trunk.pt").await.unwrap(), b"weights");

        store.commit().await.unwrap();
        assert!(store.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_is_not_present() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(!store.exists("fasta/none.fasta").await.unwrap());
        assert!(store.read("fasta/none.fasta").await.is_err());
    }
}
