//! History index repository trait.

use super::model::HistoryIndex;
use crate::error::Result;
use async_trait::async_trait;

/// Persistence contract for the shared index document.
#[async_trait]
pub trait HistoryIndexRepository: Send + Sync {
    /// Loads the index. A missing document yields an empty index.
    async fn load(&self) -> Result<HistoryIndex>;

    /// Replaces the stored index.
    async fn save(&self, index: &HistoryIndex) -> Result<()>;
}
