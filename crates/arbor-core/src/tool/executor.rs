//! Tool implementation registry and execution.
//!
//! Failures never escape `execute_tool_call`: tool errors and panics are
//! both turned into a response with `ToolStatus::Error`.

use crate::error::Result;
use crate::history::{ToolCallRecord, ToolResponseRecord, ToolStatus};
use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Result text used when a tool panics.
pub const UNEXPECTED_FAILURE: &str =
    "The tool failed unexpectedly. Please report this issue; the conversation can continue.";

/// Progress of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolStatusUpdate {
    Started { call_id: String, tool_name: String },
    Progress { call_id: String, message: String },
    Finished { call_id: String, status: ToolStatus },
}

/// Handle a running tool uses to report progress.
#[derive(Debug, Clone)]
pub struct ToolProgress {
    call_id: String,
    sender: Option<mpsc::UnboundedSender<ToolStatusUpdate>>,
}

impl ToolProgress {
    /// A handle that discards every update.
    pub fn discard(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            sender: None,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn report(&self, message: impl Into<String>) {
        self.send(ToolStatusUpdate::Progress {
            call_id: self.call_id.clone(),
            message: message.into(),
        });
    }

    fn send(&self, update: ToolStatusUpdate) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(update);
        }
    }
}

/// An executable tool.
#[async_trait]
pub trait ToolImplementation: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the tool. The returned text is fed back to the model.
    async fn execute(&self, parameters: &Map<String, Value>, progress: ToolProgress) -> Result<String>;
}

/// Name to implementation mapping.
#[derive(Clone, Default)]
pub struct ToolExecutor {
    tools: HashMap<String, Arc<dyn ToolImplementation>>,
    updates: Option<mpsc::UnboundedSender<ToolStatusUpdate>>,
}

impl ToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor whose status updates are sent on the returned
    /// receiver.
    pub fn with_status_channel() -> (Self, mpsc::UnboundedReceiver<ToolStatusUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                tools: HashMap::new(),
                updates: Some(sender),
            },
            receiver,
        )
    }

    pub fn register(&mut self, tool: Arc<dyn ToolImplementation>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Runs the implementation registered for `call.name`.
    pub async fn execute_tool_call(&self, call: &ToolCallRecord) -> ToolResponseRecord {
        let Some(tool) = self.tools.get(&call.name).cloned() else {
            tracing::warn!("[ToolExecutor] No implementation registered for '{}'", call.name);
            return Self::response(
                call,
                ToolStatus::Error,
                format!("Tool \"{}\" has no implementation.", call.name),
            );
        };

        let progress = ToolProgress {
            call_id: call.id.clone(),
            sender: self.updates.clone(),
        };
        progress.send(ToolStatusUpdate::Started {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
        });

        let outcome = AssertUnwindSafe(tool.execute(&call.parameters, progress.clone()))
            .catch_unwind()
            .await;

        let (status, result) = match outcome {
            Ok(Ok(text)) => (ToolStatus::Success, text),
            Ok(Err(err)) => {
                tracing::debug!("[ToolExecutor] '{}' failed: {}", call.name, err);
                (ToolStatus::Error, err.to_string())
            }
            Err(payload) => {
                tracing::error!(
                    "[ToolExecutor] '{}' panicked: {}",
                    call.name,
                    panic_message(payload.as_ref())
                );
                (ToolStatus::Error, UNEXPECTED_FAILURE.to_string())
            }
        };

        progress.send(ToolStatusUpdate::Finished {
            call_id: call.id.clone(),
            status,
        });
        Self::response(call, status, result)
    }

    fn response(call: &ToolCallRecord, status: ToolStatus, result: String) -> ToolResponseRecord {
        ToolResponseRecord {
            id: call.id.clone(),
            tool_name: call.name.clone(),
            result,
            status,
            completed_at: Some(Utc::now()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
