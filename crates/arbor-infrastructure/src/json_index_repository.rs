//! JSON-document implementation of `HistoryIndexRepository`.

use crate::dto::HistoryIndexV1_0_0;
use crate::migration::{MigrationChain, MigrationManager, document_version};
use arbor_core::error::Result;
use arbor_core::index::{HistoryIndex, HistoryIndexRepository};
use arbor_core::storage::BlobStorage;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

pub const HISTORY_INDEX_KEY: &str = "history_index.json";

pub struct JsonIndexRepository {
    storage: Arc<dyn BlobStorage>,
    migrations: Arc<MigrationManager>,
}

impl JsonIndexRepository {
    pub fn new(storage: Arc<dyn BlobStorage>, migrations: Arc<MigrationManager>) -> Self {
        Self {
            storage,
            migrations,
        }
    }
}

#[async_trait]
impl HistoryIndexRepository for JsonIndexRepository {
    async fn load(&self) -> Result<HistoryIndex> {
        let Some(bytes) = self.storage.read(HISTORY_INDEX_KEY).await? else {
            tracing::debug!("[JsonIndexRepository] No index yet, starting empty");
            return Ok(HistoryIndex::new());
        };

        let document: Value = serde_json::from_slice(&bytes)?;
        let version = document_version(&document)?;
        let document = self
            .migrations
            .index_registry()
            .migrate_to_latest(document, &version)?;
        let dto: HistoryIndexV1_0_0 = serde_json::from_value(document)?;
        Ok(dto.into_domain(Utc::now()))
    }

    async fn save(&self, index: &HistoryIndex) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&HistoryIndexV1_0_0::from_domain(index))?;
        self.storage.write(HISTORY_INDEX_KEY, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::build_migration_manager;
    use crate::storage::DirBlobStorage;
    use tempfile::TempDir;

    fn repository(temp_dir: &TempDir) -> (JsonIndexRepository, Arc<DirBlobStorage>) {
        let storage = Arc::new(DirBlobStorage::new(temp_dir.path()));
        let migrations = Arc::new(build_migration_manager().unwrap());
        (JsonIndexRepository::new(storage.clone(), migrations), storage)
    }

    #[tokio::test]
    async fn test_missing_index_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let (repo, _) = repository(&temp_dir);
        assert!(repo.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let (repo, _) = repository(&temp_dir);
        let mut index = HistoryIndex::new();
        index.touch("r1", "first question", 50);
        index.add_tag("r1", "anthropic").unwrap();

        repo.save(&index).await.unwrap();

        assert_eq!(repo.load().await.unwrap(), index);
    }

    #[tokio::test]
    async fn test_unversioned_and_corrupt_documents() {
        let temp_dir = TempDir::new().unwrap();
        let (repo, storage) = repository(&temp_dir);

        storage
            .write(HISTORY_INDEX_KEY, br#"{"entries": [{"id": "r1", "title": "old"}]}"#)
            .await
            .unwrap();
        assert_eq!(repo.load().await.unwrap().get("r1").unwrap().title, "old");

        storage.write(HISTORY_INDEX_KEY, b"[oops").await.unwrap();
        assert!(repo.load().await.is_err());
    }
}
