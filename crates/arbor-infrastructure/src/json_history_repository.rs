//! JSON-document implementation of `HistoryRepository`.

use crate::dto::HistoryV1_2_0;
use crate::migration::{MigrationChain, MigrationManager, document_version};
use arbor_core::error::{ArborError, Result};
use arbor_core::history::{ConversationHistory, HistoryRepository};
use arbor_core::storage::BlobStorage;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Stores each tree as `histories/<root>.json`.
///
/// Loading migrates the document to the latest schema, merges it over a
/// default tree and checks the forest invariants. Any failure along the way
/// is returned as an error; deciding on a fallback is up to the caller.
pub struct JsonHistoryRepository {
    storage: Arc<dyn BlobStorage>,
    migrations: Arc<MigrationManager>,
    default_system_prompt: String,
}

impl JsonHistoryRepository {
    pub fn new(storage: Arc<dyn BlobStorage>, migrations: Arc<MigrationManager>) -> Self {
        Self {
            storage,
            migrations,
            default_system_prompt: String::new(),
        }
    }

    /// System prompt used when a stored document carries none.
    pub fn with_default_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.default_system_prompt = prompt.into();
        self
    }

    pub fn key(root: &str) -> String {
        format!("histories/{}.json", root)
    }

    fn decode(&self, root: &str, bytes: &[u8]) -> Result<ConversationHistory> {
        let document: Value = serde_json::from_slice(bytes)?;
        let version = document_version(&document)?;
        let document = self
            .migrations
            .history_registry()
            .migrate_to_latest(document, &version)?;
        let dto: HistoryV1_2_0 = serde_json::from_value(document)?;

        let mut fallback = ConversationHistory::create_default(self.default_system_prompt.clone());
        fallback.root = root.to_string();
        let mut history = dto.into_domain(fallback);

        if history.root != root {
            tracing::warn!(
                "[JsonHistoryRepository] Document stored under '{}' claims root '{}', keeping the storage key",
                root,
                history.root
            );
            history.root = root.to_string();
        }

        history.validate_forest()?;
        Ok(history)
    }
}

#[async_trait]
impl HistoryRepository for JsonHistoryRepository {
    async fn find_by_root(&self, root: &str) -> Result<Option<ConversationHistory>> {
        let Some(bytes) = self.storage.read(&Self::key(root)).await? else {
            return Ok(None);
        };
        self.decode(root, &bytes)
            .map(Some)
            .map_err(|err| match err {
                ArborError::Migration(message) => {
                    ArborError::migration(format!("tree '{}': {}", root, message))
                }
                other => other,
            })
    }

    async fn save(&self, history: &ConversationHistory) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&HistoryV1_2_0::from_domain(history))?;
        self.storage.write(&Self::key(&history.root), &bytes).await?;
        tracing::debug!(
            "[JsonHistoryRepository] Saved tree '{}' ({} entries)",
            history.root,
            history.entry_count()
        );
        Ok(())
    }

    async fn delete(&self, root: &str) -> Result<()> {
        self.storage.delete(&Self::key(root)).await
    }

    async fn exists(&self, root: &str) -> Result<bool> {
        self.storage.exists(&Self::key(root)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::build_migration_manager;
    use crate::storage::DirBlobStorage;
    use arbor_core::history::NewEntry;
    use serde_json::json;
    use tempfile::TempDir;

    fn repository(temp_dir: &TempDir) -> (JsonHistoryRepository, Arc<DirBlobStorage>) {
        let storage = Arc::new(DirBlobStorage::new(temp_dir.path()));
        let migrations = Arc::new(build_migration_manager().unwrap());
        (
            JsonHistoryRepository::new(storage.clone(), migrations).with_default_system_prompt("default"),
            storage,
        )
    }

    #[tokio::test]
    async fn test_save_and_find_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let (repo, _) = repository(&temp_dir);

        let mut history = ConversationHistory::create_default("sys");
        let a = history.append_entry(None, NewEntry::user("hi")).entry.id;
        history.append_entry(Some(&a), NewEntry::assistant("hello"));

        repo.save(&history).await.unwrap();
        assert!(repo.exists(&history.root).await.unwrap());

        let loaded = repo.find_by_root(&history.root).await.unwrap().unwrap();
        assert_eq!(loaded, history);
    }

    #[tokio::test]
    async fn test_missing_tree_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let (repo, _) = repository(&temp_dir);

        assert!(repo.find_by_root("nope").await.unwrap().is_none());
        repo.delete("nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_legacy_document_is_migrated_and_defaulted() {
        let temp_dir = TempDir::new().unwrap();
        let (repo, storage) = repository(&temp_dir);
        let legacy = json!({
            "root": "legacy",
            "current": "b",
            "temperature": 0.9,
            "entries": {
                "a": {"id": "a", "role": "user", "message": "hi", "children": ["b"]},
                "b": {"id": "b", "role": "assistant", "message": "hello", "parent": "a"}
            }
        });
        storage
            .write("histories/legacy.json", legacy.to_string().as_bytes())
            .await
            .unwrap();

        let history = repo.find_by_root("legacy").await.unwrap().unwrap();

        assert_eq!(history.top, vec!["a".to_string()]);
        assert_eq!(history.current, "b");
        assert_eq!(history.advance_settings.temperature, Some(0.9));
        assert_eq!(history.advance_settings.system_prompt, "default");
        assert_eq!(history.active_branch().len(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_documents_are_errors() {
        let temp_dir = TempDir::new().unwrap();
        let (repo, storage) = repository(&temp_dir);

        storage.write("histories/garbage.json", b"{ not json").await.unwrap();
        assert!(repo.find_by_root("garbage").await.unwrap_err().is_serialization());

        storage
            .write("histories/future.json", br#"{"schema_version": "9.0.0"}"#)
            .await
            .unwrap();
        let err = repo.find_by_root("future").await.unwrap_err();
        assert!(matches!(err, ArborError::Migration(_)), "unexpected: {}", err);

        let broken = json!({
            "schema_version": "1.2.0",
            "top": [],
            "current": "a",
            "entries": {"a": {"id": "a", "parent": "ghost"}}
        });
        storage
            .write("histories/broken.json", broken.to_string().as_bytes())
            .await
            .unwrap();
        assert!(repo.find_by_root("broken").await.unwrap_err().is_invalid_structure());
    }

    #[tokio::test]
    async fn test_storage_key_wins_over_document_root() {
        let temp_dir = TempDir::new().unwrap();
        let (repo, storage) = repository(&temp_dir);
        storage
            .write("histories/k.json", br#"{"schema_version": "1.2.0", "root": "other"}"#)
            .await
            .unwrap();

        let history = repo.find_by_root("k").await.unwrap().unwrap();
        assert_eq!(history.root, "k");
        assert!(history.is_empty());
    }
}
