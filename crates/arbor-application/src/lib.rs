//! Application layer for arbor.
//!
//! Coordinates the domain model with storage and provider collaborators:
//! the session-scoped `HistoryCoordinator` and the `ToolCallOrchestrator`
//! retry loop.

pub mod history;
pub mod tool;

pub use history::{HistoryCoordinator, HistoryDeps};
pub use tool::{RetryOutcome, RetryState, ToolCallOrchestrator};
