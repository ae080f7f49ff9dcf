mod orchestrator;

pub use orchestrator::{RetryOutcome, RetryState, ToolCallOrchestrator};
