//! Migratable entities.
//!
//! Adding an entity means: a variant here, an entry in `Entity::all()`, an
//! arm in `Entity::name()`, a `MigratedEntity` impl and a registry in
//! `MigrationManager`. Exhaustive matches make the compiler list the spots.

use crate::dto::{HISTORY_INDEX_V1_0_0_VERSION, HISTORY_V1_2_0_VERSION};
use arbor_core::history::ConversationHistory;
use arbor_core::index::HistoryIndex;
use semver::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Entity {
    /// One conversation tree document per root id
    ConversationHistory,
    /// The shared listing document
    HistoryIndex,
}

impl Entity {
    pub const fn all() -> &'static [Entity] {
        &[Entity::ConversationHistory, Entity::HistoryIndex]
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Entity::ConversationHistory => "ConversationHistory",
            Entity::HistoryIndex => "HistoryIndex",
        }
    }
}

/// Links a domain model to its latest schema version.
///
/// Sealed: only this crate implements it.
pub trait MigratedEntity: private::Sealed + Sized {
    /// Raw latest version string, checked by the tests below.
    const LATEST_VERSION: &'static str;

    fn latest_version() -> Version;
}

mod private {
    pub trait Sealed {}
}

impl private::Sealed for ConversationHistory {}
impl MigratedEntity for ConversationHistory {
    const LATEST_VERSION: &'static str = HISTORY_V1_2_0_VERSION;

    fn latest_version() -> Version {
        Version::new(1, 2, 0)
    }
}

impl private::Sealed for HistoryIndex {}
impl MigratedEntity for HistoryIndex {
    const LATEST_VERSION: &'static str = HISTORY_INDEX_V1_0_0_VERSION;

    fn latest_version() -> Version {
        Version::new(1, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_entities_have_names() {
        for entity in Entity::all() {
            assert!(!entity.name().is_empty(), "Entity {:?} has no name", entity);
        }
    }

    #[test]
    fn test_latest_versions_match_dto_constants() {
        assert_eq!(
            ConversationHistory::latest_version(),
            Version::parse(ConversationHistory::LATEST_VERSION).unwrap()
        );
        assert_eq!(
            HistoryIndex::latest_version(),
            Version::parse(HistoryIndex::LATEST_VERSION).unwrap()
        );
    }
}
