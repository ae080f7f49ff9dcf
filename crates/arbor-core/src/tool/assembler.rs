//! Reassembly of tool calls streamed as indexed fragments.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One streamed fragment of a tool call. Fragments with the same `index`
/// belong to the same call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// A complete tool call whose arguments are still raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl RawToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parses the argument text. Blank text means no arguments.
    pub fn parse_arguments(&self) -> serde_json::Result<Value> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(&self.arguments)
    }
}

#[derive(Debug, Default)]
struct Candidate {
    index: usize,
    id: String,
    name: String,
    arguments: String,
}

/// Concatenates fragments per index, keeping candidates in the order their
/// first fragment arrived.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    candidates: Vec<Candidate>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: ToolCallDelta) {
        let position = match self.candidates.iter().position(|c| c.index == delta.index) {
            Some(position) => position,
            None => {
                self.candidates.push(Candidate {
                    index: delta.index,
                    ..Candidate::default()
                });
                self.candidates.len() - 1
            }
        };
        let candidate = &mut self.candidates[position];
        if let Some(id) = delta.id {
            candidate.id.push_str(&id);
        }
        if let Some(name) = delta.name {
            candidate.name.push_str(&name);
        }
        if let Some(arguments) = delta.arguments {
            candidate.arguments.push_str(&arguments);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// The first assembled candidate; later ones are ignored by the caller.
    pub fn first(&self) -> Option<RawToolCall> {
        self.candidates.first().map(|c| RawToolCall {
            id: c.id.clone(),
            name: c.name.clone(),
            arguments: c.arguments.clone(),
        })
    }

    pub fn into_calls(self) -> Vec<RawToolCall> {
        self.candidates
            .into_iter()
            .map(|c| RawToolCall {
                id: c.id,
                name: c.name,
                arguments: c.arguments,
            })
            .collect()
    }
}
