//! Metadata index of stored conversations.
//!
//! The index is persisted separately from conversation bodies so that
//! listing never has to load full trees.

mod model;
mod repository;

pub use model::{DEFAULT_TITLE_MAX_CHARS, HistoryIndex, HistoryIndexEntry, truncate_title};
pub use repository::HistoryIndexRepository;
