use crate::index::DEFAULT_TITLE_MAX_CHARS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default bound on provider attempts in the tool-call retry loop.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Root of `config.toml`. Every section and field is optional.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ArborConfig {
    pub storage: StorageConfig,
    pub history: HistoryConfig,
    pub tools: ToolsConfig,
    pub sync: SyncConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// System prompt given to newly created conversations.
    pub default_system_prompt: String,
    pub title_max_chars: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_system_prompt: String::new(),
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub max_attempts: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory relative tool paths are resolved against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,
}
