//! Project-rooted file reader used by reconciliation.

use arbor_core::error::{ArborError, Result};
use arbor_core::sync::FileReader;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Reads files relative to a project root. Paths leaving the root are
/// reported as unreadable.
#[derive(Debug, Clone)]
pub struct ProjectFileReader {
    root: PathBuf,
}

impl ProjectFileReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(relative_path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(ArborError::io(format!(
                        "Path '{}' is outside the project",
                        relative_path
                    )));
                }
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl FileReader for ProjectFileReader {
    async fn read_to_string(&self, relative_path: &str) -> Result<String> {
        let path = self.resolve(relative_path)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(ArborError::not_found("File", relative_path))
            }
            Err(err) => Err(err.into()),
        }
    }
}
