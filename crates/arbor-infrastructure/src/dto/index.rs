//! History index DTOs.

use arbor_core::index::{HistoryIndex, HistoryIndexEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const HISTORY_INDEX_V1_0_0_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryIndexEntryV1_0_0 {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Persisted index: a flat list of records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryIndexV1_0_0 {
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub entries: Vec<HistoryIndexEntryV1_0_0>,
}

impl HistoryIndexV1_0_0 {
    /// Records are written newest first, like the listing shows them.
    pub fn from_domain(index: &HistoryIndex) -> Self {
        Self {
            schema_version: Some(HISTORY_INDEX_V1_0_0_VERSION.to_string()),
            entries: index
                .list_sorted()
                .into_iter()
                .map(|entry| HistoryIndexEntryV1_0_0 {
                    id: entry.id.clone(),
                    title: Some(entry.title.clone()),
                    create_time: Some(entry.create_time),
                    update_time: Some(entry.update_time),
                    tags: entry.tags.iter().cloned().collect(),
                })
                .collect(),
        }
    }

    /// Missing timestamps fall back to `now`, a missing title to empty.
    pub fn into_domain(self, now: DateTime<Utc>) -> HistoryIndex {
        HistoryIndex::from_entries(self.entries.into_iter().map(|entry| {
            let create_time = entry.create_time.unwrap_or(now);
            HistoryIndexEntry {
                id: entry.id,
                title: entry.title.unwrap_or_default(),
                create_time,
                update_time: entry.update_time.unwrap_or(create_time).max(create_time),
                tags: entry.tags.into_iter().collect::<BTreeSet<_>>(),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_and_defaults() {
        let mut index = HistoryIndex::new();
        index.touch("r1", "hello", 50);
        index.add_tag("r1", "openai").unwrap();

        let dto = HistoryIndexV1_0_0::from_domain(&index);
        let json = serde_json::to_value(&dto).unwrap();
        let restored = serde_json::from_value::<HistoryIndexV1_0_0>(json)
            .unwrap()
            .into_domain(Utc::now());
        assert_eq!(restored, index);

        let now = Utc::now();
        let sparse: HistoryIndexV1_0_0 =
            serde_json::from_value(json!({"entries": [{"id": "r2"}]})).unwrap();
        let sparse = sparse.into_domain(now);
        let record = sparse.get("r2").unwrap();
        assert_eq!(record.title, "");
        assert_eq!(record.create_time, now);
        assert!(record.tags.is_empty());
    }
}
