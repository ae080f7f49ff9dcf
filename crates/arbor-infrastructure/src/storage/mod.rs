//! Storage backends.

mod dir_blob_storage;

pub use dir_blob_storage::DirBlobStorage;
