//! Reconciliation engine.
//!
//! Keeps file contents captured by past `write_to_file`/`read_file` tool
//! calls consistent with files changed outside the conversation. The engine
//! only reads files; writes belong to the tool executor.

mod engine;
mod operation;

pub use engine::{SyncReport, deleted_notice, sync_file_change_context, unreadable_notice};
pub use operation::{FileReader, FileSyncOperation};
