//! Directory-backed blob storage.
//!
//! Each key maps to a file below the base directory. Writes go through a
//! temporary sibling file that is fsynced and then renamed over the target,
//! so a crash never leaves a half-written document behind.

use arbor_core::error::{ArborError, Result};
use arbor_core::storage::BlobStorage;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Blob storage rooted at a directory.
///
/// ```text
/// base_dir/
/// ├── history_index.json
/// └── histories/
///     ├── <root-id-1>.json
///     └── <root-id-2>.json
/// ```
#[derive(Debug, Clone)]
pub struct DirBlobStorage {
    base_dir: PathBuf,
}

impl DirBlobStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolves a key to a path, rejecting keys that are empty, absolute or
    /// that would leave the base directory.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let well_formed = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !well_formed {
            return Err(ArborError::io(format!("Invalid storage key '{}'", key)));
        }
        Ok(self.base_dir.join(relative))
    }

    fn temp_path(path: &Path) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()))
    }
}

#[async_trait]
impl BlobStorage for DirBlobStorage {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp_path = Self::temp_path(&path);
        let written = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(err) = written {
            // Best effort; the original error is what matters.
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        tracing::debug!("[DirBlobStorage] Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        Ok(fs::try_exists(&path).await?)
    }
}
