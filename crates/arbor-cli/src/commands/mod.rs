pub mod context;
pub mod history;
pub mod sync;
