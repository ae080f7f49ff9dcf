use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One observed filesystem change, supplied per reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileSyncOperation {
    /// Path as recorded in tool calls, relative to the project root
    pub relative_path: String,
    /// Rename target, if the file moved
    #[serde(default)]
    pub new_path: Option<String>,
    /// Current content when the observer already has it
    #[serde(default)]
    pub new_content: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl FileSyncOperation {
    pub fn modified(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            ..Self::default()
        }
    }

    pub fn deleted(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            deleted: true,
            ..Self::default()
        }
    }

    pub fn renamed(relative_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            new_path: Some(new_path.into()),
            ..Self::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.new_content = Some(content.into());
        self
    }

    /// Path the current content lives at.
    pub fn target_path(&self) -> &str {
        self.new_path.as_deref().unwrap_or(&self.relative_path)
    }
}

/// Read-only view of the project files.
///
/// Implementations return `ArborError::NotFound` for a missing file and any
/// other error for an unreadable one.
#[async_trait]
pub trait FileReader: Send + Sync {
    async fn read_to_string(&self, relative_path: &str) -> Result<String>;
}
