//! Reconciliation of recorded file tool calls against external changes.
//!
//! The active branch is walked from `current` to its root. Each relative
//! path is refreshed at most once per pass, so the occurrence closest to
//! `current` wins and older ones are left as they were.

use super::operation::{FileReader, FileSyncOperation};
use crate::history::{ConversationHistory, EntryRole};
use crate::tool::{CONTENT_PARAM, READ_FILE, RELATIVE_PATH_PARAM, WRITE_TO_FILE};
use serde_json::Value;
use std::collections::HashSet;

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries whose recorded content, path or result changed
    pub updated_entries: Vec<String>,
    /// Paths claimed during the pass, closest to `current` first
    pub processed_paths: Vec<String>,
    /// Paths whose read failed; recorded content was kept
    pub failed_paths: Vec<String>,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        !self.updated_entries.is_empty()
    }
}

/// Recorded file side effect found on the active branch.
enum SyncTarget {
    /// Assistant entry whose first call writes `path`
    Write(String),
    /// Tool entry holding the result of reading `path`
    Read(String),
}

impl SyncTarget {
    fn path(&self) -> &str {
        match self {
            SyncTarget::Write(path) | SyncTarget::Read(path) => path,
        }
    }
}

pub fn deleted_notice(path: &str) -> String {
    format!("[file deleted: {}]", path)
}

pub fn unreadable_notice(path: &str) -> String {
    format!("[file unreadable: {}]", path)
}

/// Refreshes recorded write/read tool calls on the active branch of
/// `history` against `operations`.
///
/// With no operations and `force_sync` unset the tree is left untouched.
/// With `force_sync` set, recorded paths without a matching operation are
/// re-read as well. Read failures never abort the walk. `update_time` moves
/// only when something changed, so repeating a pass is a no-op.
pub async fn sync_file_change_context(
    history: &mut ConversationHistory,
    operations: &[FileSyncOperation],
    force_sync: bool,
    reader: &dyn FileReader,
) -> SyncReport {
    let mut report = SyncReport::default();
    if operations.is_empty() && !force_sync {
        return report;
    }

    let mut processed: HashSet<String> = HashSet::new();

    for id in history.ancestor_ids(&history.current) {
        let Some(target) = classify(history, &id) else {
            continue;
        };
        let path = target.path().to_string();
        if processed.contains(&path) {
            tracing::debug!("[Reconcile] '{}' already refreshed, skipping entry {}", path, id);
            continue;
        }
        let operation = operations.iter().find(|op| op.relative_path == path);

        match target {
            SyncTarget::Write(_) => {
                let (fetched, renamed_to) = match operation {
                    // A deleted file keeps its last recorded content; an
                    // older read of the same path still gets the notice.
                    Some(op) if op.deleted => continue,
                    Some(op) => {
                        let fetched = match &op.new_content {
                            Some(content) => Ok(content.clone()),
                            None => reader.read_to_string(op.target_path()).await,
                        };
                        (fetched, op.new_path.clone())
                    }
                    None if force_sync => (reader.read_to_string(&path).await, None),
                    None => {
                        processed.insert(path.clone());
                        continue;
                    }
                };
                processed.insert(path.clone());
                report.processed_paths.push(path.clone());

                let content = match fetched {
                    Ok(content) => content,
                    Err(err) => {
                        tracing::warn!("[Reconcile] Keeping recorded content of '{}': {}", path, err);
                        report.failed_paths.push(path);
                        continue;
                    }
                };

                let Some(call) = history.get_mut(&id).and_then(|e| e.first_tool_call_mut()) else {
                    continue;
                };
                let mut changed = false;
                if call.str_param(CONTENT_PARAM) != Some(content.as_str()) {
                    call.parameters
                        .insert(CONTENT_PARAM.to_string(), Value::String(content));
                    changed = true;
                }
                if call.partial {
                    call.partial = false;
                    changed = true;
                }
                if let Some(new_path) = renamed_to {
                    if call.str_param(RELATIVE_PATH_PARAM) != Some(new_path.as_str()) {
                        call.parameters
                            .insert(RELATIVE_PATH_PARAM.to_string(), Value::String(new_path));
                        changed = true;
                    }
                }
                if changed {
                    tracing::debug!("[Reconcile] Refreshed write of '{}' in entry {}", path, id);
                    report.updated_entries.push(id);
                }
            }
            SyncTarget::Read(_) => {
                let refreshed = match operation {
                    Some(op) if op.deleted => deleted_notice(&path),
                    Some(op) => match &op.new_content {
                        Some(content) => content.clone(),
                        None => read_or_notice(reader, op.target_path(), &mut report).await,
                    },
                    None if force_sync => read_or_notice(reader, &path, &mut report).await,
                    None => {
                        processed.insert(path);
                        continue;
                    }
                };
                processed.insert(path.clone());
                report.processed_paths.push(path.clone());

                let Some(response) = history
                    .get_mut(&id)
                    .and_then(|e| e.first_tool_response_mut())
                else {
                    continue;
                };
                if response.result != refreshed {
                    response.result = refreshed;
                    tracing::debug!("[Reconcile] Refreshed read of '{}' in entry {}", path, id);
                    report.updated_entries.push(id);
                }
            }
        }
    }

    if report.changed() {
        history.touch();
    }
    tracing::debug!(
        "[Reconcile] Pass over tree '{}': {} updated, {} failed",
        history.root,
        report.updated_entries.len(),
        report.failed_paths.len()
    );
    report
}

/// Identifies the file side effect recorded on entry `id`, skipping
/// entries whose tool-call shape is missing or malformed.
fn classify(history: &ConversationHistory, id: &str) -> Option<SyncTarget> {
    let entry = history.get(id)?;
    match entry.role {
        EntryRole::Assistant => {
            let call = entry.first_tool_call().filter(|call| call.name == WRITE_TO_FILE)?;
            let path = call.str_param(RELATIVE_PATH_PARAM).filter(|p| !p.is_empty())?;
            Some(SyncTarget::Write(path.to_string()))
        }
        EntryRole::Tool => {
            entry
                .first_tool_response()
                .filter(|response| response.tool_name == READ_FILE)?;
            // The read target is recorded on the call, not on the response.
            let parent = history.get(entry.parent.as_deref()?)?;
            let call = parent.first_tool_call().filter(|call| call.name == READ_FILE)?;
            let path = call.str_param(RELATIVE_PATH_PARAM).filter(|p| !p.is_empty())?;
            Some(SyncTarget::Read(path.to_string()))
        }
        EntryRole::User => None,
    }
}

async fn read_or_notice(reader: &dyn FileReader, path: &str, report: &mut SyncReport) -> String {
    match reader.read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.is_not_found() => deleted_notice(path),
        Err(err) => {
            tracing::warn!("[Reconcile] Could not read '{}': {}", path, err);
            report.failed_paths.push(path.to_string());
            unreadable_notice(path)
        }
    }
}
