//! Conversation tree DTOs.
//!
//! Only the latest schema has a typed DTO; older documents are upgraded as
//! JSON values by the migrations in `crate::migration::history` before they
//! are decoded here.

use arbor_core::history::{
    AdvanceSettings, ConversationEntry, ConversationHistory, EntryRole, ToolCallRecord,
    ToolResponseRecord,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const HISTORY_V1_2_0_VERSION: &str = "1.2.0";

/// Generation settings as persisted. Missing fields fall back one by one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdvanceSettingsV1_2_0 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_tools: Option<Vec<String>>,
}

impl AdvanceSettingsV1_2_0 {
    fn from_domain(settings: &AdvanceSettings) -> Self {
        Self {
            system_prompt: Some(settings.system_prompt.clone()),
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_tokens: settings.max_tokens,
            enabled_tools: Some(settings.enabled_tools.clone()),
        }
    }

    fn into_domain(self, fallback: AdvanceSettings) -> AdvanceSettings {
        AdvanceSettings {
            system_prompt: self.system_prompt.unwrap_or(fallback.system_prompt),
            temperature: self.temperature.or(fallback.temperature),
            top_p: self.top_p.or(fallback.top_p),
            max_tokens: self.max_tokens.or(fallback.max_tokens),
            enabled_tools: self.enabled_tools.unwrap_or(fallback.enabled_tools),
        }
    }
}

/// One entry as persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntryV1_2_0 {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub role: Option<EntryRole>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_responses: Option<Vec<ToolResponseRecord>>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Option<Vec<String>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl EntryV1_2_0 {
    fn from_domain(entry: &ConversationEntry) -> Self {
        Self {
            id: Some(entry.id.clone()),
            role: Some(entry.role),
            message: Some(entry.message.clone()),
            images: (!entry.images.is_empty()).then(|| entry.images.clone()),
            tool_calls: entry.tool_calls.clone(),
            tool_responses: entry.tool_responses.clone(),
            parent: entry.parent.clone(),
            children: Some(entry.children.clone()),
            created_at: Some(entry.created_at),
        }
    }

    /// A missing id falls back to the map key, a missing role to `user`,
    /// a missing timestamp to the tree's creation time.
    fn into_domain(self, key: &str, tree_created: DateTime<Utc>) -> ConversationEntry {
        ConversationEntry {
            id: self.id.unwrap_or_else(|| key.to_string()),
            role: self.role.unwrap_or(EntryRole::User),
            message: self.message.unwrap_or_default(),
            images: self.images.unwrap_or_default(),
            tool_calls: self.tool_calls,
            tool_responses: self.tool_responses,
            parent: self.parent,
            children: self.children.unwrap_or_default(),
            created_at: self.created_at.unwrap_or(tree_created),
        }
    }
}

/// Latest persisted shape of a conversation tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryV1_2_0 {
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub top: Option<Vec<String>>,
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub entries: Option<HashMap<String, EntryV1_2_0>>,
    #[serde(default)]
    pub advance_settings: Option<AdvanceSettingsV1_2_0>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
}

impl HistoryV1_2_0 {
    pub fn from_domain(history: &ConversationHistory) -> Self {
        Self {
            schema_version: Some(HISTORY_V1_2_0_VERSION.to_string()),
            root: Some(history.root.clone()),
            top: Some(history.top.clone()),
            current: Some(history.current.clone()),
            entries: Some(
                history
                    .entries
                    .iter()
                    .map(|(id, entry)| (id.clone(), EntryV1_2_0::from_domain(entry)))
                    .collect(),
            ),
            advance_settings: Some(AdvanceSettingsV1_2_0::from_domain(&history.advance_settings)),
            create_time: Some(history.create_time),
            update_time: Some(history.update_time),
        }
    }

    /// Merges the persisted fields over `fallback`, field by field.
    pub fn into_domain(self, fallback: ConversationHistory) -> ConversationHistory {
        let create_time = self.create_time.unwrap_or(fallback.create_time);
        let update_time = self
            .update_time
            .unwrap_or(fallback.update_time)
            .max(create_time);
        let entries = match self.entries {
            Some(entries) => entries
                .into_iter()
                .map(|(key, entry)| {
                    let entry = entry.into_domain(&key, create_time);
                    (key, entry)
                })
                .collect(),
            None => fallback.entries,
        };

        ConversationHistory {
            root: self.root.unwrap_or(fallback.root),
            top: self.top.unwrap_or(fallback.top),
            current: self.current.unwrap_or(fallback.current),
            entries,
            advance_settings: match self.advance_settings {
                Some(settings) => settings.into_domain(fallback.advance_settings),
                None => fallback.advance_settings,
            },
            create_time,
            update_time,
        }
    }
}
