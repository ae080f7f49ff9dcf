//! Conversation entry types.
//!
//! An entry is one turn of a conversation tree: a user message, an assistant
//! reply (optionally proposing tool calls) or a tool turn carrying the
//! outcomes of executed calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Represents the role of an entry in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
    /// Outcome of one or more executed tool calls.
    Tool,
}

/// A tool invocation proposed by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Call identifier, echoed back by the matching tool response.
    pub id: String,
    /// Registered tool name.
    pub name: String,
    /// Structured parameters as proposed by the model.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Set while the recorded parameters are known to be incomplete
    /// (e.g. a write whose content was still streaming).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
}

impl ToolCallRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parameters,
            partial: false,
        }
    }

    /// Returns a string parameter, if present and a string.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

/// Execution status of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
    Pending,
}

/// Outcome of one executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponseRecord {
    /// Identifier of the call this responds to.
    pub id: String,
    pub tool_name: String,
    /// Result text fed back to the model.
    pub result: String,
    pub status: ToolStatus,
    /// When the tool finished (None while pending).
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A single turn in a conversation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// Unique identifier, immutable after creation.
    pub id: String,
    pub role: EntryRole,
    /// Text payload; may be empty for tool-only turns.
    #[serde(default)]
    pub message: String,
    /// Local file references attached to this turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// Tool calls proposed on an assistant turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    /// Tool outcomes recorded on a tool turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_responses: Option<Vec<ToolResponseRecord>>,
    /// Originating entry, None for root-level turns.
    #[serde(default)]
    pub parent: Option<String>,
    /// Entries branching from this one, in creation order.
    #[serde(default)]
    pub children: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationEntry {
    /// First proposed tool call, if any.
    pub fn first_tool_call(&self) -> Option<&ToolCallRecord> {
        self.tool_calls.as_ref().and_then(|calls| calls.first())
    }

    pub fn first_tool_call_mut(&mut self) -> Option<&mut ToolCallRecord> {
        self.tool_calls.as_mut().and_then(|calls| calls.first_mut())
    }

    /// First recorded tool response, if any.
    pub fn first_tool_response(&self) -> Option<&ToolResponseRecord> {
        self.tool_responses.as_ref().and_then(|responses| responses.first())
    }

    pub fn first_tool_response_mut(&mut self) -> Option<&mut ToolResponseRecord> {
        self.tool_responses
            .as_mut()
            .and_then(|responses| responses.first_mut())
    }
}

/// Content of an entry about to be appended. The tree assigns id, links and
/// creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub role: EntryRole,
    pub message: String,
    pub images: Vec<String>,
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    pub tool_responses: Option<Vec<ToolResponseRecord>>,
}

impl NewEntry {
    pub fn new(role: EntryRole, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
            images: Vec::new(),
            tool_calls: None,
            tool_responses: None,
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::new(EntryRole::User, message)
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self::new(EntryRole::Assistant, message)
    }

    /// A tool turn carrying the given outcomes and no text.
    pub fn tool(responses: Vec<ToolResponseRecord>) -> Self {
        Self {
            tool_responses: Some(responses),
            ..Self::new(EntryRole::Tool, "")
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCallRecord>) -> Self {
        self.tool_calls = Some(calls);
        self
    }
}
