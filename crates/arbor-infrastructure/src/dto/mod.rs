//! Data Transfer Objects (DTOs) for persistence.
//!
//! DTOs are private to the infrastructure layer. Every field of the latest
//! DTO is optional; conversion into the domain applies per-field defaults
//! over a freshly generated value.
//!
//! ## Schema Versioning (Semantic Versioning)
//!
//! - **MAJOR (X.0.0)**: Breaking changes (field removal, type changes)
//! - **MINOR (1.X.0)**: Backward-compatible additions and moves
//!
//! ### Conversation Tree Version History
//! - **1.0.0**: Single-root documents without `top`
//! - **1.1.0**: Added `top` (root-level entry list)
//! - **1.2.0**: `temperature`/`system_prompt` moved into `advance_settings`
//!
//! ### History Index Version History
//! - **1.0.0**: Initial schema
//!
//! A document without `schema_version` is read as 1.0.0.

mod history;
mod index;

pub use history::{AdvanceSettingsV1_2_0, EntryV1_2_0, HISTORY_V1_2_0_VERSION, HistoryV1_2_0};
pub use index::{HISTORY_INDEX_V1_0_0_VERSION, HistoryIndexEntryV1_0_0, HistoryIndexV1_0_0};

/// Version assumed for documents that predate `schema_version`.
pub const LEGACY_SCHEMA_VERSION: &str = "1.0.0";
