use crate::error::{ArborError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Default number of characters kept when deriving a title from the first
/// message of a conversation.
pub const DEFAULT_TITLE_MAX_CHARS: usize = 50;

/// Lightweight listing record for one conversation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryIndexEntry {
    /// Root id of the tree this record describes
    pub id: String,
    pub title: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    /// Provider names (and user tags) attached to the conversation
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Index of all stored conversations, keyed by root id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryIndex {
    entries: HashMap<String, HistoryIndexEntry>,
}

impl HistoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from already-decoded records.
    pub fn from_entries(entries: impl IntoIterator<Item = HistoryIndexEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.id.clone(), entry))
                .collect(),
        }
    }

    pub fn get(&self, root: &str) -> Option<&HistoryIndexEntry> {
        self.entries.get(root)
    }

    pub fn contains(&self, root: &str) -> bool {
        self.entries.contains_key(root)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records a mutation of tree `root`.
    ///
    /// The first call for an untracked tree creates its record with a title
    /// cut from `first_message`; later calls only refresh `update_time`.
    /// Returns `true` when a record was created.
    pub fn touch(&mut self, root: &str, first_message: &str, title_max_chars: usize) -> bool {
        let now = Utc::now();
        match self.entries.get_mut(root) {
            Some(entry) => {
                if now > entry.update_time {
                    entry.update_time = now;
                }
                false
            }
            None => {
                self.entries.insert(
                    root.to_string(),
                    HistoryIndexEntry {
                        id: root.to_string(),
                        title: truncate_title(first_message, title_max_chars),
                        create_time: now,
                        update_time: now,
                        tags: BTreeSet::new(),
                    },
                );
                true
            }
        }
    }

    pub fn set_title(&mut self, root: &str, title: impl Into<String>) -> Result<()> {
        let entry = self.entry_mut(root)?;
        entry.title = title.into();
        Ok(())
    }

    /// Adds a tag; adding an existing tag changes nothing.
    pub fn add_tag(&mut self, root: &str, tag: impl Into<String>) -> Result<()> {
        self.entry_mut(root)?.tags.insert(tag.into());
        Ok(())
    }

    pub fn remove_tag(&mut self, root: &str, tag: &str) -> Result<()> {
        self.entry_mut(root)?.tags.remove(tag);
        Ok(())
    }

    pub fn remove(&mut self, root: &str) -> Option<HistoryIndexEntry> {
        self.entries.remove(root)
    }

    /// Full mapping of root id to record.
    pub fn list(&self) -> &HashMap<String, HistoryIndexEntry> {
        &self.entries
    }

    /// Records ordered by most recent update first.
    pub fn list_sorted(&self) -> Vec<&HistoryIndexEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|a, b| b.update_time.cmp(&a.update_time).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    fn entry_mut(&mut self, root: &str) -> Result<&mut HistoryIndexEntry> {
        self.entries
            .get_mut(root)
            .ok_or_else(|| ArborError::not_found("HistoryIndexEntry", root))
    }
}

/// Keeps the first `max_chars` characters of `message`, whitespace included.
pub fn truncate_title(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}
