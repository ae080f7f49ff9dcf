//! Conversation history domain module.
//!
//! # Module Structure
//!
//! - `entry`: entry types (`ConversationEntry`, `EntryRole`, tool records)
//! - `model`: the branchable tree (`ConversationHistory`)
//! - `repository`: repository trait for tree persistence

mod entry;
mod model;
mod repository;

pub use entry::{
    ConversationEntry, EntryRole, NewEntry, ToolCallRecord, ToolResponseRecord, ToolStatus,
};
pub use model::{AdvanceSettings, AppendOutcome, ConversationHistory, EditMode};
pub use repository::HistoryRepository;
