//! Generic validation of proposed tool calls against registered schemas.
//!
//! An invalid call is a normal outcome: its feedback text is written for the
//! model, which gets it back as a correction prompt.

use super::schema::{ToolSchemaRegistry, json_type_name};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolValidation {
    pub is_valid: bool,
    /// Empty exactly when the call is valid.
    pub feedback: String,
}

impl ToolValidation {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            feedback: String::new(),
        }
    }

    pub fn invalid(feedback: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            feedback: feedback.into(),
        }
    }

    /// Result for arguments that could not be parsed at all.
    pub fn unparsable(tool_name: &str, error: impl std::fmt::Display) -> Self {
        Self::invalid(format!(
            "The arguments for tool \"{}\" are not valid JSON ({}). Send the arguments as a single JSON object.",
            tool_name, error
        ))
    }
}

/// Checks `parameters` against the schema registered for `tool_name`.
///
/// Every problem found (each missing parameter, each type mismatch) is
/// listed in the feedback.
pub fn is_viable_tool_call(registry: &ToolSchemaRegistry, tool_name: &str, parameters: &Value) -> ToolValidation {
    let schema = match registry.lookup(tool_name) {
        None => {
            let available: Vec<_> = registry.names().collect();
            return ToolValidation::invalid(format!(
                "Tool \"{}\" does not exist. Available tools: {}.",
                tool_name,
                available.join(", ")
            ));
        }
        Some(None) => {
            return ToolValidation::invalid(format!(
                "Tool \"{}\" is recognized but cannot be used yet. Answer without it or choose another tool.",
                tool_name
            ));
        }
        Some(Some(schema)) => schema,
    };

    let Some(arguments) = parameters.as_object() else {
        return ToolValidation::invalid(format!(
            "The arguments for tool \"{}\" must be a JSON object, got {}.",
            tool_name,
            json_type_name(parameters)
        ));
    };

    let mut problems = Vec::new();
    for spec in &schema.parameters {
        match arguments.get(&spec.name) {
            None if spec.required => problems.push(format!(
                "missing required parameter \"{}\" ({})",
                spec.name,
                spec.param_type.as_str()
            )),
            None => {}
            Some(value) if !spec.param_type.matches(value) => problems.push(format!(
                "parameter \"{}\" must be {}, got {}",
                spec.name,
                spec.param_type.as_str(),
                json_type_name(value)
            )),
            Some(_) => {}
        }
    }

    if problems.is_empty() {
        ToolValidation::valid()
    } else {
        let lines: Vec<_> = problems.iter().map(|p| format!("- {}", p)).collect();
        ToolValidation::invalid(format!(
            "Invalid call to tool \"{}\":\n{}",
            tool_name,
            lines.join("\n")
        ))
    }
}
