//! Configuration service.
//!
//! Loads `ArborConfig` from a TOML file and caches it. A missing file gives
//! the defaults; a malformed one is logged and also gives the defaults.

use crate::paths::ArborPaths;
use arbor_core::config::ArborConfig;
use arbor_core::error::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    config: Arc<RwLock<Option<ArborConfig>>>,
}

impl ConfigService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Service reading `~/.config/arbor/config.toml`.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(ArborPaths::config_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configuration, loading it on first access.
    pub fn get_config(&self) -> ArborConfig {
        {
            let cached = self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(config) = cached.as_ref() {
                return config.clone();
            }
        }

        let loaded = Self::load_from(&self.path);
        let mut cached = self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *cached = Some(loaded.clone());
        loaded
    }

    /// Forces a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut cached = self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *cached = None;
    }

    pub fn load_from(path: &Path) -> ArborConfig {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("[ConfigService] No config at {}, using defaults", path.display());
                return ArborConfig::default();
            }
            Err(err) => {
                tracing::warn!("[ConfigService] Cannot read {}: {}, using defaults", path.display(), err);
                return ArborConfig::default();
            }
        };

        match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("[ConfigService] Malformed {}: {}, using defaults", path.display(), err);
                ArborConfig::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_and_malformed_files_give_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        assert_eq!(ConfigService::load_from(&path), ArborConfig::default());

        std::fs::write(&path, "[tools\nmax_attempts = ").unwrap();
        assert_eq!(ConfigService::load_from(&path), ArborConfig::default());
    }

    #[test]
    fn test_config_is_cached_until_invalidated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[tools]\nmax_attempts = 3\n").unwrap();
        let service = ConfigService::new(&path);

        assert_eq!(service.get_config().tools.max_attempts, 3);

        std::fs::write(&path, "[tools]\nmax_attempts = 7\n").unwrap();
        assert_eq!(service.get_config().tools.max_attempts, 3);

        service.invalidate_cache();
        assert_eq!(service.get_config().tools.max_attempts, 7);
    }
}
