pub mod config_service;
pub mod dto;
pub mod fs_reader;
pub mod json_history_repository;
pub mod json_index_repository;
pub mod migration;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::fs_reader::ProjectFileReader;
pub use crate::json_history_repository::JsonHistoryRepository;
pub use crate::json_index_repository::JsonIndexRepository;
pub use crate::paths::ArborPaths;
pub use crate::storage::DirBlobStorage;
