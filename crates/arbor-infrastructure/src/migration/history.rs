//! Conversation tree migrations.
//!
//! Steps operate on raw JSON documents so that old shapes never need a
//! typed DTO of their own.

use super::traits::{Migration, TypedMigration};
use anyhow::{Context, Result};
use semver::Version;
use serde_json::{Map, Value};

fn as_document(value: &mut Value) -> Result<&mut Map<String, Value>> {
    value
        .as_object_mut()
        .context("Conversation document is not a JSON object")
}

/// 1.0.0 → 1.1.0: derives `top` from entries without a parent.
///
/// Root-level entries are ordered by `created_at`, then id.
#[derive(Debug)]
pub struct HistoryV1_0ToV1_1Migration;

impl Migration for HistoryV1_0ToV1_1Migration {
    fn from_version(&self) -> Version {
        Version::new(1, 0, 0)
    }

    fn to_version(&self) -> Version {
        Version::new(1, 1, 0)
    }

    fn description(&self) -> &str {
        "derive top-level entry list"
    }
}

impl TypedMigration<Value, Value> for HistoryV1_0ToV1_1Migration {
    fn migrate(&self, mut from: Value) -> Result<Value> {
        let document = as_document(&mut from)?;

        if !document.contains_key("top") {
            let mut roots: Vec<(String, String)> = match document.get("entries") {
                Some(Value::Object(entries)) => entries
                    .iter()
                    .filter(|(_, entry)| entry.get("parent").is_none_or(Value::is_null))
                    .map(|(key, entry)| {
                        let id = entry
                            .get("id")
                            .and_then(Value::as_str)
                            .unwrap_or(key)
                            .to_string();
                        let created = entry
                            .get("created_at")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        (created, id)
                    })
                    .collect(),
                Some(Value::Null) | None => Vec::new(),
                Some(_) => anyhow::bail!("'entries' must be an object"),
            };
            roots.sort();
            let top = roots.into_iter().map(|(_, id)| Value::String(id)).collect();
            document.insert("top".to_string(), Value::Array(top));
        }

        document.insert("schema_version".to_string(), Value::String(self.to_version().to_string()));
        Ok(from)
    }
}

/// 1.1.0 → 1.2.0: moves root-level `temperature` and `system_prompt` into
/// `advance_settings`. Values already present in `advance_settings` win.
#[derive(Debug)]
pub struct HistoryV1_1ToV1_2Migration;

const MOVED_SETTINGS: [&str; 2] = ["temperature", "system_prompt"];

impl Migration for HistoryV1_1ToV1_2Migration {
    fn from_version(&self) -> Version {
        Version::new(1, 1, 0)
    }

    fn to_version(&self) -> Version {
        Version::new(1, 2, 0)
    }

    fn description(&self) -> &str {
        "move generation settings into advance_settings"
    }
}

impl TypedMigration<Value, Value> for HistoryV1_1ToV1_2Migration {
    fn migrate(&self, mut from: Value) -> Result<Value> {
        let document = as_document(&mut from)?;

        let moved: Vec<(&str, Value)> = MOVED_SETTINGS
            .iter()
            .filter_map(|key| document.remove(*key).map(|value| (*key, value)))
            .collect();

        if !moved.is_empty() {
            let settings = document
                .entry("advance_settings")
                .or_insert_with(|| Value::Object(Map::new()));
            if settings.is_null() {
                *settings = Value::Object(Map::new());
            }
            let settings = settings
                .as_object_mut()
                .context("'advance_settings' must be an object")?;
            for (key, value) in moved {
                settings.entry(key).or_insert(value);
            }
        }

        document.insert("schema_version".to_string(), Value::String(self.to_version().to_string()));
        Ok(from)
    }
}
