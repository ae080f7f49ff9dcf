//! Linear migration registry.
//!
//! Each document migrates through every intermediate version; no step is
//! ever skipped.

use super::traits::{MigrationChain, TypedMigration};
use anyhow::{Context, Result};
use semver::Version;
use std::sync::Arc;

/// Ordered chain of migrations ending at `latest_version`.
///
/// ```ignore
/// let mut registry = MigrationRegistry::new(Version::new(1, 2, 0));
/// registry.register(Arc::new(HistoryV1_0ToV1_1Migration));  // 1.0.0 → 1.1.0
/// registry.register(Arc::new(HistoryV1_1ToV1_2Migration));  // 1.1.0 → 1.2.0
/// let doc = registry.migrate_to_latest(doc, &Version::new(1, 0, 0))?;
/// ```
#[derive(Debug)]
pub struct MigrationRegistry<T> {
    migrations: Vec<Arc<dyn TypedMigration<T, T>>>,
    latest_version: Version,
}

impl<T> MigrationRegistry<T> {
    pub fn new(latest_version: Version) -> Self {
        Self {
            migrations: Vec::new(),
            latest_version,
        }
    }

    pub fn latest_version(&self) -> &Version {
        &self.latest_version
    }

    /// Appends a step to the chain.
    ///
    /// # Panics
    ///
    /// Panics if the step does not start where the previous one ended, or
    /// if it targets a version beyond `latest_version`. Both are wiring
    /// mistakes in `build_migration_manager`.
    pub fn register(&mut self, migration: Arc<dyn TypedMigration<T, T>>) {
        if let Some(last) = self.migrations.last() {
            assert_eq!(
                last.to_version(),
                migration.from_version(),
                "Migration chain broken: '{}' ends at {} but '{}' starts at {}",
                last.description(),
                last.to_version(),
                migration.description(),
                migration.from_version()
            );
        }

        if migration.to_version() > self.latest_version {
            panic!(
                "Migration target version {} exceeds registry's latest version {}",
                migration.to_version(),
                self.latest_version
            );
        }

        self.migrations.push(migration);
    }

    pub fn register_all(&mut self, migrations: Vec<Arc<dyn TypedMigration<T, T>>>) {
        for migration in migrations {
            self.register(migration);
        }
    }

    pub fn start_version(&self) -> Option<Version> {
        self.migrations.first().map(|m| m.from_version())
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    fn find_start_index(&self, from_version: &Version) -> Option<usize> {
        self.migrations.iter().position(|m| m.can_migrate(from_version))
    }
}

impl<T> MigrationChain<T> for MigrationRegistry<T> {
    fn migrate_to_latest(&self, mut data: T, current_version: &Version) -> Result<T> {
        if current_version == &self.latest_version {
            return Ok(data);
        }

        if current_version > &self.latest_version {
            anyhow::bail!(
                "Document version ({}) is newer than the latest supported version ({})",
                current_version,
                self.latest_version
            );
        }

        let start_idx = self.find_start_index(current_version).ok_or_else(|| {
            let available: Vec<String> = self
                .migrations
                .iter()
                .map(|m| format!("{} -> {}", m.from_version(), m.to_version()))
                .collect();
            anyhow::anyhow!(
                "No migration found starting from version {}. Available migrations: [{}]",
                current_version,
                available.join(", ")
            )
        })?;

        let steps = self.migrations.len() - start_idx;
        tracing::info!(
            "[Migration] {} -> {} ({} steps)",
            current_version,
            self.latest_version,
            steps
        );

        for (i, migration) in self.migrations[start_idx..].iter().enumerate() {
            tracing::debug!(
                "[Migration] Step {}/{}: {} -> {} ({})",
                i + 1,
                steps,
                migration.from_version(),
                migration.to_version(),
                migration.description()
            );

            data = migration.migrate(data).with_context(|| {
                format!(
                    "Migration failed at step {}: {} -> {}",
                    i + 1,
                    migration.from_version(),
                    migration.to_version()
                )
            })?;
        }

        Ok(data)
    }

    fn available_paths(&self, from: &Version) -> Vec<Vec<Version>> {
        match self.find_start_index(from) {
            Some(start_idx) => {
                let mut path = vec![from.clone()];
                path.extend(self.migrations[start_idx..].iter().map(|m| m.to_version()));
                vec![path]
            }
            None => vec![],
        }
    }
}
