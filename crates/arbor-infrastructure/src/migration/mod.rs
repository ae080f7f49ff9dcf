//! Schema migration framework for arbor documents.
//!
//! A linear chain per entity: every document migrates through each
//! intermediate version in order, as raw JSON, before being decoded into the
//! latest DTO.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               MigrationManager               │
//! ├──────────────────────────────────────────────┤
//! │  ConversationHistory (1.0.0 → 1.1.0 → 1.2.0) │
//! │  HistoryIndex        (1.0.0)                 │
//! └──────────────────────────────────────────────┘
//! ```

mod entity;
mod history;
mod manager;
mod registry;
mod traits;

pub use entity::{Entity, MigratedEntity};
pub use history::{HistoryV1_0ToV1_1Migration, HistoryV1_1ToV1_2Migration};
pub use manager::{MigrationManager, MigrationManagerBuilder};
pub use registry::MigrationRegistry;
pub use traits::{Migration, MigrationChain, TypedMigration};

use crate::dto::LEGACY_SCHEMA_VERSION;
use anyhow::{Context, Result};
use arbor_core::history::ConversationHistory;
use arbor_core::index::HistoryIndex;
use semver::Version;
use serde_json::Value;
use std::sync::Arc;

/// Builds the manager with every entity's registry wired up.
pub fn build_migration_manager() -> Result<MigrationManager> {
    let history_registry = {
        let mut registry = MigrationRegistry::new(ConversationHistory::latest_version());
        registry.register(Arc::new(HistoryV1_0ToV1_1Migration));
        registry.register(Arc::new(HistoryV1_1ToV1_2Migration));
        registry
    };

    // Still at its first schema.
    let index_registry = MigrationRegistry::new(HistoryIndex::latest_version());

    MigrationManager::builder()
        .with_history_registry(history_registry)
        .with_index_registry(index_registry)
        .build()
}

/// Reads `schema_version` from a document; absent means the legacy 1.0.0.
pub fn document_version(document: &Value) -> Result<Version> {
    let raw = match document.get("schema_version") {
        Some(Value::String(version)) => version.as_str(),
        Some(Value::Null) | None => LEGACY_SCHEMA_VERSION,
        Some(other) => anyhow::bail!("schema_version must be a string, got {}", other),
    };
    Version::parse(raw).with_context(|| format!("Invalid schema_version '{}'", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_migration_manager() {
        let manager = build_migration_manager().unwrap();
        assert_eq!(manager.history_registry().len(), 2);
        assert!(manager.index_registry().is_empty());
    }

    #[test]
    fn test_all_entities_have_registries() {
        let manager = build_migration_manager().unwrap();
        for entity in Entity::all() {
            match entity {
                Entity::ConversationHistory => {
                    assert_eq!(manager.history_registry().latest_version(), &Version::new(1, 2, 0))
                }
                Entity::HistoryIndex => {
                    assert_eq!(manager.index_registry().latest_version(), &Version::new(1, 0, 0))
                }
            }
        }
    }

    #[test]
    fn test_document_version() {
        assert_eq!(document_version(&json!({})).unwrap(), Version::new(1, 0, 0));
        assert_eq!(
            document_version(&json!({"schema_version": "1.1.0"})).unwrap(),
            Version::new(1, 1, 0)
        );
        assert!(document_version(&json!({"schema_version": 3})).is_err());
        assert!(document_version(&json!({"schema_version": "soon"})).is_err());
    }

    #[test]
    fn test_legacy_document_reaches_latest() {
        let manager = build_migration_manager().unwrap();
        let legacy = json!({"temperature": 0.3, "entries": {}});

        let version = document_version(&legacy).unwrap();
        let migrated = manager
            .history_registry()
            .migrate_to_latest(legacy, &version)
            .unwrap();

        assert_eq!(migrated["schema_version"], "1.2.0");
        assert_eq!(migrated["top"], json!([]));
        assert_eq!(migrated["advance_settings"]["temperature"], json!(0.3));
    }
}
