use crate::history::{ConversationEntry, ConversationHistory, EntryRole, ToolCallRecord};
use crate::tool::{RawToolCall, ToolSchema, ToolSchemaRegistry};
use serde::{Deserialize, Serialize};

/// One message of normalized provider context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub role: EntryRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// Calls proposed by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Call answered by a tool message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ProviderMessage {
    pub fn new(role: EntryRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Messages for one entry. A tool entry yields one message per response.
    pub fn from_entry(entry: &ConversationEntry) -> Vec<Self> {
        match (entry.role, &entry.tool_responses) {
            (EntryRole::Tool, Some(responses)) if !responses.is_empty() => responses
                .iter()
                .map(|response| Self {
                    tool_call_id: Some(response.id.clone()),
                    ..Self::new(EntryRole::Tool, response.result.clone())
                })
                .collect(),
            _ => vec![Self {
                images: entry.images.clone(),
                tool_calls: entry.tool_calls.clone().unwrap_or_default(),
                ..Self::new(entry.role, entry.message.clone())
            }],
        }
    }
}

/// Normalized request handed to a provider adapter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub system_prompt: String,
    pub messages: Vec<ProviderMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub tools: Vec<ToolSchema>,
    #[serde(default)]
    pub stream: bool,
}

impl ProviderRequest {
    /// Builds context from the active branch of `history`, root first, with
    /// the tree's generation settings and the schemas of its enabled tools.
    pub fn from_history(history: &ConversationHistory, registry: &ToolSchemaRegistry) -> Self {
        let settings = &history.advance_settings;
        Self {
            system_prompt: settings.system_prompt.clone(),
            messages: history
                .active_branch()
                .into_iter()
                .flat_map(ProviderMessage::from_entry)
                .collect(),
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_tokens: settings.max_tokens,
            tools: registry.schemas_for(&settings.enabled_tools),
            stream: false,
        }
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn push(&mut self, message: ProviderMessage) {
        self.messages.push(message);
    }
}

/// Final reply of one provider call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderReply {
    pub text: String,
    #[serde(default)]
    pub tool_call: Option<RawToolCall>,
}

impl ProviderReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_call: None,
        }
    }

    pub fn with_tool_call(text: impl Into<String>, call: RawToolCall) -> Self {
        Self {
            text: text.into(),
            tool_call: Some(call),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{NewEntry, ToolResponseRecord, ToolStatus};
    use crate::tool::{READ_FILE, WEB_SEARCH};
    use serde_json::Map;

    #[test]
    fn test_from_history_follows_active_branch() {
        let mut history = ConversationHistory::create_default("sys");
        history.advance_settings.temperature = Some(0.2);
        history.advance_settings.enabled_tools = vec![READ_FILE.to_string(), "ghost".to_string()];

        let a = history.append_entry(None, NewEntry::user("hi")).entry.id;
        history.append_entry(Some(&a), NewEntry::assistant("abandoned"));
        let b = history
            .append_entry(
                Some(&a),
                NewEntry::assistant("").with_tool_calls(vec![ToolCallRecord::new("c1", WEB_SEARCH, Map::new())]),
            )
            .entry
            .id;
        history.append_entry(
            Some(&b),
            NewEntry::tool(vec![ToolResponseRecord {
                id: "c1".to_string(),
                tool_name: WEB_SEARCH.to_string(),
                result: "results".to_string(),
                status: ToolStatus::Success,
                completed_at: None,
            }]),
        );

        let request = ProviderRequest::from_history(&history, &ToolSchemaRegistry::with_builtins());

        assert_eq!(request.system_prompt, "sys");
        assert_eq!(request.temperature, Some(0.2));
        let contents: Vec<_> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "", "results"]);
        assert_eq!(request.messages[1].tool_calls.len(), 1);
        assert_eq!(request.messages[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(request.tools.len(), 1);
        assert!(!request.stream);
    }
}
