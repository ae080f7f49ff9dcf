use anyhow::{Result, bail};
use arbor_application::HistoryCoordinator;
use arbor_core::sync::FileSyncOperation;

/// Parses `FROM=TO`.
pub fn parse_rename(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((from, to)) if !from.is_empty() && !to.is_empty() => {
            Ok((from.to_string(), to.to_string()))
        }
        _ => Err(format!("expected FROM=TO, got '{}'", value)),
    }
}

pub fn operations(
    changed: Vec<String>,
    deleted: Vec<String>,
    renamed: Vec<(String, String)>,
) -> Vec<FileSyncOperation> {
    changed
        .into_iter()
        .map(FileSyncOperation::modified)
        .chain(deleted.into_iter().map(FileSyncOperation::deleted))
        .chain(
            renamed
                .into_iter()
                .map(|(from, to)| FileSyncOperation::renamed(from, to)),
        )
        .collect()
}

pub async fn run(
    coordinator: &mut HistoryCoordinator,
    root: &str,
    operations: &[FileSyncOperation],
    force: bool,
) -> Result<()> {
    if !coordinator.index().contains(root) {
        bail!("Conversation {} not found", root);
    }
    coordinator.switch_active(root).await;

    let report = coordinator.sync_file_change_context(operations, force).await;
    println!(
        "Updated {} entr{}, checked {} path(s), {} unreadable",
        report.updated_entries.len(),
        if report.updated_entries.len() == 1 { "y" } else { "ies" },
        report.processed_paths.len(),
        report.failed_paths.len()
    );
    Ok(())
}
