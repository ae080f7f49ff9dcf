//! Conversation history repository trait.

use super::model::ConversationHistory;
use crate::error::Result;
use async_trait::async_trait;

/// Persistence contract for whole conversation trees, keyed by root id.
///
/// Implementations handle schema versioning and migration of stored
/// documents. Callers that must never fail on storage faults (the
/// persistence coordinator) wrap every call and fall back on error.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Finds a tree by its root id.
    ///
    /// - `Ok(Some(tree))`: tree found and decoded
    /// - `Ok(None)`: nothing stored under this id
    /// - `Err(_)`: the stored document could not be read or decoded
    async fn find_by_root(&self, root: &str) -> Result<Option<ConversationHistory>>;

    /// Serializes the whole tree under its root id.
    async fn save(&self, history: &ConversationHistory) -> Result<()>;

    /// Removes a stored tree. Deleting a missing tree is not an error.
    async fn delete(&self, root: &str) -> Result<()>;

    async fn exists(&self, root: &str) -> Result<bool>;
}
