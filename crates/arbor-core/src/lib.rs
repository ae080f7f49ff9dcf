pub mod config;
pub mod error;
pub mod history;
pub mod index;
pub mod notice;
pub mod provider;
pub mod storage;
pub mod sync;
pub mod tool;

// Re-export common types
pub use error::{ArborError, Result};
pub use notice::{Notice, Notifier, Severity};
