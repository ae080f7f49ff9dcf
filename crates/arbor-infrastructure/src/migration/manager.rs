//! Central manager for all entity migrations.

use super::entity::Entity;
use super::registry::MigrationRegistry;
use anyhow::Result;
use serde_json::Value;

/// Holds one migration registry per entity.
///
/// ```ignore
/// let manager = MigrationManager::builder()
///     .with_history_registry(history_registry)
///     .with_index_registry(index_registry)
///     .build()?;
/// let doc = manager.history_registry().migrate_to_latest(doc, &version)?;
/// ```
#[derive(Debug)]
pub struct MigrationManager {
    history_registry: MigrationRegistry<Value>,
    index_registry: MigrationRegistry<Value>,
}

impl MigrationManager {
    pub fn builder() -> MigrationManagerBuilder {
        MigrationManagerBuilder::new()
    }

    pub fn history_registry(&self) -> &MigrationRegistry<Value> {
        &self.history_registry
    }

    pub fn index_registry(&self) -> &MigrationRegistry<Value> {
        &self.index_registry
    }

    /// Checks every entity's registry. An empty registry is fine for an
    /// entity still at its first schema.
    pub fn validate(&self) -> Result<()> {
        for entity in Entity::all() {
            let registry = match entity {
                Entity::ConversationHistory => &self.history_registry,
                Entity::HistoryIndex => &self.index_registry,
            };
            if let Some(start) = registry.start_version() {
                if start >= *registry.latest_version() {
                    anyhow::bail!(
                        "{} migrations start at {} but the latest version is {}",
                        entity.name(),
                        start,
                        registry.latest_version()
                    );
                }
            }
            tracing::debug!(
                "[Migration] {} registry: {} migrations up to {}",
                entity.name(),
                registry.len(),
                registry.latest_version()
            );
        }
        Ok(())
    }
}

/// Builder that refuses to produce a manager with a missing registry.
#[derive(Default)]
pub struct MigrationManagerBuilder {
    history_registry: Option<MigrationRegistry<Value>>,
    index_registry: Option<MigrationRegistry<Value>>,
}

impl MigrationManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_registry(mut self, registry: MigrationRegistry<Value>) -> Self {
        self.history_registry = Some(registry);
        self
    }

    pub fn with_index_registry(mut self, registry: MigrationRegistry<Value>) -> Self {
        self.index_registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<MigrationManager> {
        let history_registry = self
            .history_registry
            .ok_or_else(|| anyhow::anyhow!("ConversationHistory migration registry not set"))?;

        let index_registry = self
            .index_registry
            .ok_or_else(|| anyhow::anyhow!("HistoryIndex migration registry not set"))?;

        let manager = MigrationManager {
            history_registry,
            index_registry,
        };
        manager.validate()?;

        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    #[test]
    fn test_builder_requires_all_registries() {
        let result = MigrationManagerBuilder::new()
            .with_history_registry(MigrationRegistry::new(Version::new(1, 2, 0)))
            .build();

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("HistoryIndex"), "unexpected error: {}", err_msg);
    }

    #[test]
    fn test_builder_success_with_all_registries() {
        let manager = MigrationManagerBuilder::new()
            .with_history_registry(MigrationRegistry::new(Version::new(1, 2, 0)))
            .with_index_registry(MigrationRegistry::new(Version::new(1, 0, 0)))
            .build()
            .unwrap();

        assert!(manager.history_registry().is_empty());
        assert!(manager.validate().is_ok());
    }
}
