//! Path resolution for arbor's configuration and data.
//!
//! ```text
//! ~/.config/arbor/             # Config directory
//! └── config.toml
//!
//! ~/.local/share/arbor/        # Data directory (overridable)
//! ├── history_index.json
//! └── histories/
//!     └── <root-id>.json
//! ```

use arbor_core::config::ArborConfig;
use arbor_core::error::{ArborError, Result};
use std::path::PathBuf;

const APP_DIR: &str = "arbor";

pub struct ArborPaths;

impl ArborPaths {
    /// Platform configuration directory (XDG on Linux).
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| ArborError::config("Cannot determine the configuration directory"))
    }

    /// Platform data directory (XDG on Linux).
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| ArborError::config("Cannot determine the data directory"))
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// `storage.data_dir` from the config, or the platform default.
    pub fn data_dir(config: &ArborConfig) -> Result<PathBuf> {
        match &config.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::default_data_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_data_dir_wins() {
        let mut config = ArborConfig::default();
        config.storage.data_dir = Some(PathBuf::from("/tmp/arbor-data"));
        assert_eq!(ArborPaths::data_dir(&config).unwrap(), PathBuf::from("/tmp/arbor-data"));
    }
}
