//! Declarative tool schemas.
//!
//! A schema lists each parameter with a runtime type tag and whether it is
//! required. A tool name may also be registered without a schema, meaning
//! it is known but not wired up yet.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

pub const WRITE_TO_FILE: &str = "write_to_file";
pub const READ_FILE: &str = "read_file";
pub const WEB_SEARCH: &str = "web_search";

pub const RELATIVE_PATH_PARAM: &str = "relative_path";
pub const CONTENT_PARAM: &str = "content";
pub const QUERY_PARAM: &str = "query";

/// Runtime type tag of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

/// Name of the JSON type of `value`, for feedback messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn required(mut self, name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        self.parameters.push(ParamSpec {
            name: name.into(),
            param_type,
            required: true,
            description: description.into(),
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        self.parameters.push(ParamSpec {
            name: name.into(),
            param_type,
            required: false,
            description: description.into(),
        });
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// JSON-Schema rendering handed to provider adapters.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({"type": p.param_type.as_str(), "description": p.description}),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }
}

/// Tool name to schema mapping. `None` marks a recognized tool without a
/// schema.
#[derive(Debug, Clone, Default)]
pub struct ToolSchemaRegistry {
    tools: BTreeMap<String, Option<ToolSchema>>,
}

impl ToolSchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the file and search tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            ToolSchema::new(WRITE_TO_FILE, "Write content to a file in the project")
                .required(RELATIVE_PATH_PARAM, ParamType::String, "Path relative to the project root")
                .required(CONTENT_PARAM, ParamType::String, "Full new content of the file"),
        );
        registry.register(
            ToolSchema::new(READ_FILE, "Read a file from the project")
                .required(RELATIVE_PATH_PARAM, ParamType::String, "Path relative to the project root"),
        );
        registry.register(
            ToolSchema::new(WEB_SEARCH, "Search the web")
                .required(QUERY_PARAM, ParamType::String, "Search query"),
        );
        registry
    }

    pub fn register(&mut self, schema: ToolSchema) {
        self.tools.insert(schema.name.clone(), Some(schema));
    }

    /// Registers a name whose schema is not available yet.
    pub fn register_unwired(&mut self, name: impl Into<String>) {
        self.tools.insert(name.into(), None);
    }

    /// `None` for an unknown tool, `Some(None)` for a tool without schema.
    pub fn lookup(&self, name: &str) -> Option<Option<&ToolSchema>> {
        self.tools.get(name).map(Option::as_ref)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Schemas of the enabled tools that have one, in `enabled` order.
    pub fn schemas_for(&self, enabled: &[String]) -> Vec<ToolSchema> {
        enabled
            .iter()
            .filter_map(|name| self.tools.get(name).and_then(Option::clone))
            .collect()
    }
}
