//! Core traits for the migration framework.

use anyhow::Result;
use semver::Version;

/// Version metadata of one migration step.
pub trait Migration: Send + Sync {
    fn from_version(&self) -> Version;

    fn to_version(&self) -> Version;

    fn can_migrate(&self, version: &Version) -> bool {
        version == &self.from_version()
    }

    /// Human-readable summary, used in migration logs.
    fn description(&self) -> &str;
}

/// A migration step that transforms data of type `From` into `To`.
///
/// Persisted documents are migrated as `serde_json::Value`, so registries
/// use `TypedMigration<Value, Value>`.
pub trait TypedMigration<From, To>: Migration + std::fmt::Debug {
    fn migrate(&self, from: From) -> Result<To>;
}

/// A chain that upgrades data to the latest version, step by step.
pub trait MigrationChain<T> {
    /// Applies every step from `current_version` up to the latest version.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `current_version` is newer than the latest supported version
    /// - no step starts at `current_version`
    /// - any step fails
    fn migrate_to_latest(&self, data: T, current_version: &Version) -> Result<T>;

    /// Version paths reachable from `from`. A linear chain has at most one.
    fn available_paths(&self, from: &Version) -> Vec<Vec<Version>>;
}
