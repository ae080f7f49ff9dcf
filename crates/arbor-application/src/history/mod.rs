//! Conversation history application services.
//!
//! This module owns the active tree of a session and every write to stored
//! trees and to the index.

mod coordinator;

pub use coordinator::{HistoryCoordinator, HistoryDeps};
