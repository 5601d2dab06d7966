//! Tool trait definition and types.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::context::ToolContext;
use crate::error::ToolError;

/// JSON type a parameter must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A string. Numbers are accepted and read back as their decimal text,
    /// since phone numbers sometimes arrive unquoted.
    String,
    Number,
    Boolean,
    /// An array of strings, or a single comma separated string.
    StringList,
}

impl ParamKind {
    fn json_type(&self) -> Value {
        match self {
            ParamKind::String => json!({"type": "string"}),
            ParamKind::Number => json!({"type": "number"}),
            ParamKind::Boolean => json!({"type": "boolean"}),
            ParamKind::StringList => json!({"type": "array", "items": {"type": "string"}}),
        }
    }

    pub(crate) fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string() || value.is_number(),
            ParamKind::Number => {
                value.is_number() || value.as_str().is_some_and(|s| s.trim().parse::<f64>().is_ok())
            }
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::StringList => {
                value.is_string()
                    || value
                        .as_array()
                        .is_some_and(|items| items.iter().all(Value::is_string))
            }
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// JSON-schema `parameters` object for a tool's declared params.
pub fn parameters_schema(params: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for spec in params {
        let mut schema = spec.kind.json_type();
        schema["description"] = json!(spec.description);
        properties.insert(spec.name.to_string(), schema);
        if spec.required {
            required.push(spec.name);
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Arguments passed to a tool for execution.
#[derive(Clone)]
pub struct ToolArgs {
    /// Parameters as key-value pairs.
    pub params: HashMap<String, Value>,
    /// Tenant scope and service handles for this call.
    pub ctx: Arc<ToolContext>,
}

impl ToolArgs {
    pub fn new(params: HashMap<String, Value>, ctx: Arc<ToolContext>) -> Self {
        Self { params, ctx }
    }

    /// Get a string parameter, returning an error if missing or empty.
    pub fn get_string(&self, key: &str) -> Result<String, ToolError> {
        self.get_string_opt(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get an optional string parameter. Blank strings count as absent.
    pub fn get_string_opt(&self, key: &str) -> Option<String> {
        let text = match self.params.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    /// Get an optional number, parsing numeric strings.
    pub fn get_number_opt(&self, key: &str) -> Option<f64> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get an optional list of strings from an array or a comma separated
    /// string.
    pub fn get_string_list_opt(&self, key: &str) -> Option<Vec<String>> {
        let items: Vec<String> = match self.params.get(key)? {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .collect(),
            Value::String(s) => s.split(',').map(|s| s.trim().to_string()).collect(),
            _ => return None,
        };
        let items: Vec<String> = items.into_iter().filter(|s| !s.is_empty()).collect();
        (!items.is_empty()).then_some(items)
    }

    /// Whether a parameter is present with a non-blank value.
    pub fn has(&self, key: &str) -> bool {
        match self.params.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }
}

/// Output from a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The result text read back to the assistant.
    pub content: String,
    /// Whether the execution was successful.
    pub success: bool,
}

impl ToolOutput {
    /// Create a successful output.
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            success: true,
        }
    }

    /// Create a failed output.
    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            success: false,
        }
    }
}

/// A capability the assistant can invoke during a call.
///
/// Each tool performs one side effect. Parameters declared in [`params`]
/// and [`required_any`] are checked by the registry before `execute` runs,
/// so implementations can read required values without re-validating.
///
/// [`params`]: Tool::params
/// [`required_any`]: Tool::required_any
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's unique name (used for dispatch).
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// Declared parameters.
    fn params(&self) -> &'static [ParamSpec];

    /// Groups of parameters where at least one per group must be present.
    fn required_any(&self) -> &'static [&'static [&'static str]] {
        &[]
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: &[ParamSpec] = &[
        ParamSpec::required("query", ParamKind::String, "Search query"),
        ParamSpec::optional("maxResults", ParamKind::Number, "Result count"),
    ];

    #[test]
    fn test_parameters_schema() {
        let schema = parameters_schema(PARAMS);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["maxResults"]["type"], "number");
    }

    #[test]
    fn test_kind_accepts() {
        assert!(ParamKind::String.accepts(&json!(15551234567u64)));
        assert!(!ParamKind::String.accepts(&json!({"a": 1})));
        assert!(ParamKind::Number.accepts(&json!("5")));
        assert!(ParamKind::StringList.accepts(&json!("vip, lead")));
        assert!(!ParamKind::StringList.accepts(&json!([1, 2])));
    }
}
