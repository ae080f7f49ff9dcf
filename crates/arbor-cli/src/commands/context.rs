use anyhow::{Context, Result};
use arbor_application::{HistoryCoordinator, HistoryDeps};
use arbor_core::notice::Notifier;
use arbor_infrastructure::migration::build_migration_manager;
use arbor_infrastructure::{
    ArborPaths, ConfigService, DirBlobStorage, JsonHistoryRepository, JsonIndexRepository,
    ProjectFileReader,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Wires the JSON repositories and the project reader into a coordinator.
pub async fn open_coordinator(
    config_path: Option<PathBuf>,
    data_dir: Option<PathBuf>,
) -> Result<HistoryCoordinator> {
    let config_service = match config_path {
        Some(path) => ConfigService::new(path),
        None => ConfigService::default_location().context("Failed to locate config.toml")?,
    };
    let mut config = config_service.get_config();
    if data_dir.is_some() {
        config.storage.data_dir = data_dir;
    }

    let data_dir = ArborPaths::data_dir(&config).context("Failed to resolve the data directory")?;
    let project_root = match &config.sync.project_root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    tracing::debug!(
        "[arbor] data_dir={}, project_root={}",
        data_dir.display(),
        project_root.display()
    );

    let storage = Arc::new(DirBlobStorage::new(data_dir));
    let migrations = Arc::new(build_migration_manager().context("Invalid migration chain")?);
    let histories = JsonHistoryRepository::new(storage.clone(), migrations.clone())
        .with_default_system_prompt(config.history.default_system_prompt.clone());
    let deps = HistoryDeps {
        histories: Arc::new(histories),
        index: Arc::new(JsonIndexRepository::new(storage, migrations)),
        files: Arc::new(ProjectFileReader::new(project_root)),
    };

    Ok(HistoryCoordinator::open(deps, config, Notifier::detached()).await)
}
