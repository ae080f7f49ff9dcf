//! Conversation history domain model.
//!
//! A `ConversationHistory` is a forest of entries sharing one root id, which
//! is also its persistence key. Provider context is always built by walking
//! from `current` up to a root.

use super::entry::{ConversationEntry, EntryRole, NewEntry};
use crate::error::{ArborError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Generation parameters shared by every turn of one tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdvanceSettings {
    /// System prompt sent with every request.
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Tool names offered to the model; empty offers none.
    #[serde(default)]
    pub enabled_tools: Vec<String>,
}

impl AdvanceSettings {
    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Self::default()
        }
    }
}

/// How an edit to a past entry is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    /// Mutate the entry's message directly.
    InPlace,
    /// Create a sibling carrying the edited message and make it current.
    #[default]
    Branch,
}

/// Result of `append_entry`.
///
/// An entry whose parent could not be resolved is still returned but is not
/// linked into the tree (`warning` is set and the tree is unchanged).
#[derive(Debug, Clone, PartialEq)]
pub struct AppendOutcome {
    pub entry: ConversationEntry,
    pub warning: Option<ArborError>,
}

impl AppendOutcome {
    pub fn is_docked(&self) -> bool {
        self.warning.is_none()
    }
}

/// One branchable conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    /// Identifier of the whole tree and its persistence key
    pub root: String,
    /// Root-level entry ids, in creation order
    pub top: Vec<String>,
    /// Active leaf, or empty for a fresh tree
    pub current: String,
    /// All entries, keyed by id
    pub entries: HashMap<String, ConversationEntry>,
    pub advance_settings: AdvanceSettings,
    pub create_time: DateTime<Utc>,
    /// Refreshed on every mutation, never moves backwards
    pub update_time: DateTime<Utc>,
}

impl ConversationHistory {
    /// Creates an empty tree with a fresh root id.
    pub fn create_default(system_prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            root: Uuid::new_v4().to_string(),
            top: Vec::new(),
            current: String::new(),
            entries: HashMap::new(),
            advance_settings: AdvanceSettings::with_system_prompt(system_prompt),
            create_time: now,
            update_time: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: &str) -> Option<&ConversationEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ConversationEntry> {
        self.entries.get_mut(id)
    }

    pub fn current_entry(&self) -> Option<&ConversationEntry> {
        self.entries.get(&self.current)
    }

    /// Refreshes `update_time`, keeping it monotonically non-decreasing.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.update_time {
            self.update_time = now;
        }
    }

    /// Appends a new entry under `parent_id`, or at root level when `None`,
    /// and makes it current.
    pub fn append_entry(&mut self, parent_id: Option<&str>, new_entry: NewEntry) -> AppendOutcome {
        let id = Uuid::new_v4().to_string();
        let entry = ConversationEntry {
            id: id.clone(),
            role: new_entry.role,
            message: new_entry.message,
            images: new_entry.images,
            tool_calls: new_entry.tool_calls,
            tool_responses: new_entry.tool_responses,
            parent: parent_id.map(str::to_owned),
            children: Vec::new(),
            created_at: Utc::now(),
        };

        match parent_id {
            Some(parent_id) => match self.entries.get_mut(parent_id) {
                Some(parent) => parent.children.push(id.clone()),
                None => {
                    tracing::warn!(
                        "[History] Parent '{}' not found in tree '{}', entry left undocked",
                        parent_id,
                        self.root
                    );
                    return AppendOutcome {
                        entry,
                        warning: Some(ArborError::not_found("ConversationEntry", parent_id)),
                    };
                }
            },
            None => self.top.push(id.clone()),
        }

        self.entries.insert(id.clone(), entry.clone());
        self.current = id;
        self.touch();

        AppendOutcome {
            entry,
            warning: None,
        }
    }

    /// Ids from `id` up to its root (inclusive), leaf first.
    ///
    /// Stops at an unresolvable parent or a revisited id, so a damaged tree
    /// never loops.
    pub fn ancestor_ids(&self, id: &str) -> Vec<String> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(id.to_string());

        while let Some(current) = cursor {
            let Some(entry) = self.entries.get(&current) else {
                break;
            };
            if !seen.insert(current.clone()) {
                tracing::warn!("[History] Cycle detected at entry '{}'", current);
                break;
            }
            cursor = entry.parent.clone();
            ids.push(current);
        }

        ids
    }

    /// Entries on the active branch, root first.
    pub fn active_branch(&self) -> Vec<&ConversationEntry> {
        self.ancestor_ids(&self.current)
            .iter()
            .rev()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    /// Returns a view holding only the ancestor chain of `entry_id` with
    /// `current` set to it. The live tree is not touched.
    ///
    /// Without an id the live tree is returned as is. An unknown id yields an
    /// empty view.
    pub fn branch_before_entry(&self, entry_id: Option<&str>) -> ConversationHistory {
        let Some(entry_id) = entry_id else {
            return self.clone();
        };

        let chain = self.ancestor_ids(entry_id);
        let mut view = ConversationHistory {
            root: self.root.clone(),
            top: Vec::new(),
            current: String::new(),
            entries: HashMap::with_capacity(chain.len()),
            advance_settings: self.advance_settings.clone(),
            create_time: self.create_time,
            update_time: self.update_time,
        };

        let Some(chain_root) = chain.last() else {
            return view;
        };

        for (position, id) in chain.iter().enumerate() {
            if let Some(entry) = self.entries.get(id) {
                let mut entry = entry.clone();
                // Children outside the chain are not part of the view.
                entry.children = match position {
                    0 => Vec::new(),
                    _ => vec![chain[position - 1].clone()],
                };
                view.entries.insert(id.clone(), entry);
            }
        }
        view.top = vec![chain_root.clone()];
        view.current = entry_id.to_string();
        view
    }

    /// Detaches the current entry if it is a tool turn and moves `current`
    /// back to its parent. Returns the removed entry.
    pub fn rollback_last_tool_response(&mut self) -> Option<ConversationEntry> {
        let current = self.current_entry()?;
        if current.role != EntryRole::Tool {
            return None;
        }

        let id = current.id.clone();
        let parent = current.parent.clone();
        let removed = self.remove_subtree(&id)?;
        self.current = parent.unwrap_or_default();
        self.touch();
        Some(removed)
    }

    /// Edits a past entry's message.
    ///
    /// Returns the id of the entry now carrying the edited message: the same
    /// id for `EditMode::InPlace`, a new sibling for `EditMode::Branch`.
    pub fn edit_entry(&mut self, entry_id: &str, message: impl Into<String>, mode: EditMode) -> Result<String> {
        let message = message.into();
        let entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ArborError::not_found("ConversationEntry", entry_id))?;

        match mode {
            EditMode::InPlace => {
                entry.message = message;
                self.touch();
                Ok(entry_id.to_string())
            }
            EditMode::Branch => {
                let sibling = NewEntry {
                    role: entry.role,
                    message,
                    images: entry.images.clone(),
                    tool_calls: entry.tool_calls.clone(),
                    tool_responses: entry.tool_responses.clone(),
                };
                let parent = entry.parent.clone();
                let outcome = self.append_entry(parent.as_deref(), sibling);
                match outcome.warning {
                    None => Ok(outcome.entry.id),
                    Some(err) => Err(err),
                }
            }
        }
    }

    /// Moves `current` to an existing entry.
    pub fn set_current(&mut self, entry_id: &str) -> Result<()> {
        if !self.entries.contains_key(entry_id) {
            return Err(ArborError::not_found("ConversationEntry", entry_id));
        }
        self.current = entry_id.to_string();
        self.touch();
        Ok(())
    }

    /// Checks the forest invariants: unique keys, the parent/children
    /// biconditional, root-level membership in `top`, acyclicity, and that
    /// `current` resolves.
    pub fn validate_forest(&self) -> Result<()> {
        let mut problems = Vec::new();

        for (key, entry) in &self.entries {
            if key != &entry.id {
                problems.push(format!("entry keyed '{}' has id '{}'", key, entry.id));
            }

            match &entry.parent {
                Some(parent_id) => match self.entries.get(parent_id) {
                    Some(parent) if parent.children.contains(&entry.id) => {}
                    Some(_) => problems.push(format!(
                        "entry '{}' is not listed among its parent's children",
                        entry.id
                    )),
                    None => problems.push(format!(
                        "entry '{}' references missing parent '{}'",
                        entry.id, parent_id
                    )),
                },
                None if !self.top.contains(&entry.id) => {
                    problems.push(format!("root-level entry '{}' is missing from top", entry.id))
                }
                None => {}
            }

            let mut seen_children = HashSet::new();
            for child_id in &entry.children {
                if !seen_children.insert(child_id) {
                    problems.push(format!("entry '{}' lists child '{}' twice", entry.id, child_id));
                }
                match self.entries.get(child_id) {
                    Some(child) if child.parent.as_deref() == Some(entry.id.as_str()) => {}
                    Some(_) => problems.push(format!(
                        "child '{}' of '{}' points at a different parent",
                        child_id, entry.id
                    )),
                    None => problems.push(format!(
                        "entry '{}' lists missing child '{}'",
                        entry.id, child_id
                    )),
                }
            }

            // A sound chain ends at a parentless entry.
            let chain = self.ancestor_ids(&entry.id);
            let terminates = chain
                .last()
                .and_then(|id| self.entries.get(id))
                .is_some_and(|last| last.parent.is_none());
            if !terminates {
                problems.push(format!("entry '{}' does not lead back to a root", entry.id));
            }
        }

        let mut seen_top = HashSet::new();
        for id in &self.top {
            if !seen_top.insert(id) {
                problems.push(format!("top lists '{}' twice", id));
            }
            match self.entries.get(id) {
                Some(entry) if entry.parent.is_none() => {}
                Some(_) => problems.push(format!("top entry '{}' has a parent", id)),
                None => problems.push(format!("top lists missing entry '{}'", id)),
            }
        }

        if !self.current.is_empty() && !self.entries.contains_key(&self.current) {
            problems.push(format!("current '{}' does not resolve", self.current));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            problems.sort();
            Err(ArborError::invalid_structure(problems.join("; ")))
        }
    }

    /// Removes an entry and everything below it, unlinking it from its
    /// parent or from `top`.
    fn remove_subtree(&mut self, id: &str) -> Option<ConversationEntry> {
        let removed = self.entries.remove(id)?;

        match &removed.parent {
            Some(parent_id) => {
                if let Some(parent) = self.entries.get_mut(parent_id) {
                    parent.children.retain(|child| child != id);
                }
            }
            None => self.top.retain(|top_id| top_id != id),
        }

        let mut pending = removed.children.clone();
        while let Some(child_id) = pending.pop() {
            if let Some(child) = self.entries.remove(&child_id) {
                pending.extend(child.children);
            }
        }

        Some(removed)
    }
}
