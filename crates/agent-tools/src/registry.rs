//! Tool registry: name lookup, generic parameter validation and dispatch of
//! a webhook's tool calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use vapi_client::{ToolCall, ToolCallResult, ToolResults};

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::tool::{parameters_schema, Tool, ToolArgs, ToolOutput};

/// Default upper bound on one tool execution.
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(20);

/// Registry for managing tools.
///
/// Tools are kept in registration order so listings are stable.
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
    timeout: Duration,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: IndexMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        info!("Registering tool: {}", name);
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a list of registered tool names.
    pub fn list_tools(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Check if a tool is registered.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Function definition (`name`, `description`, `parameters`) used when
    /// registering the tool on the AI platform.
    pub fn function_definition(&self, name: &str) -> Option<(String, String, Value)> {
        let tool = self.tools.get(name)?;
        Some((
            tool.name().to_string(),
            tool.description().to_string(),
            parameters_schema(tool.params()),
        ))
    }

    /// Check declared parameters. Runs before every execution.
    pub fn validate(tool: &dyn Tool, params: &HashMap<String, Value>) -> Result<(), ToolError> {
        let present = |name: &str| match params.get(name) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        };

        for spec in tool.params() {
            if !present(spec.name) {
                if spec.required {
                    return Err(ToolError::MissingParameter(spec.name.to_string()));
                }
                continue;
            }
            if let Some(value) = params.get(spec.name) {
                if !spec.kind.accepts(value) {
                    return Err(ToolError::invalid(
                        spec.name,
                        format!("expected {:?}", spec.kind).to_lowercase(),
                    ));
                }
            }
        }

        for group in tool.required_any() {
            if !group.iter().any(|name| present(name)) {
                return Err(ToolError::MissingParameter(group.join(" or ")));
            }
        }
        Ok(())
    }

    /// Validate and execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        params: HashMap<String, Value>,
        ctx: Arc<ToolContext>,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        Self::validate(tool.as_ref(), &params)?;

        debug!("Executing tool '{}' with {} params", name, params.len());

        let result = timeout(self.timeout, tool.execute(ToolArgs::new(params, ctx)))
            .await
            .map_err(|_| ToolError::Timeout(self.timeout.as_secs()))??;

        debug!(
            "Tool '{}' completed: success={}, content_len={}",
            name,
            result.success,
            result.content.len()
        );

        Ok(result)
    }

    /// Run every tool call in request order. Each call id gets exactly one
    /// entry; failures become `error` entries instead of aborting the batch.
    pub async fn dispatch(&self, calls: &[ToolCall], ctx: Arc<ToolContext>) -> ToolResults {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            if call.is_malformed() {
                warn!(tool_call_id = %call.id, "Tool call without a function name");
                results.push(ToolCallResult::err(&call.id, MALFORMED_CALL));
                continue;
            }
            let params: HashMap<String, Value> =
                call.function.arguments_object().into_iter().collect();
            let entry = match self.execute(&call.function.name, params, ctx.clone()).await {
                Ok(output) if output.success => ToolCallResult::ok(&call.id, output.content),
                Ok(output) => ToolCallResult::err(&call.id, output.content),
                Err(e) => {
                    warn!(tool = %call.function.name, tool_call_id = %call.id, error = %e, "Tool call failed");
                    ToolCallResult::err(&call.id, e.to_string())
                }
            };
            results.push(entry);
        }
        ToolResults { results }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub const MALFORMED_CALL: &str = "Malformed tool call: missing function name";

/// One `error` entry per call id, used when the batch is refused as a whole.
pub fn reject_all(calls: &[ToolCall], message: &str) -> ToolResults {
    ToolResults {
        results: calls
            .iter()
            .map(|call| ToolCallResult::err(&call.id, message))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ParamKind, ParamSpec};
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes back the input"
        }

        fn params(&self) -> &'static [ParamSpec] {
            const PARAMS: &[ParamSpec] = &[
                ParamSpec::required("message", ParamKind::String, "Text to echo"),
                ParamSpec::optional("phone", ParamKind::String, "Phone"),
                ParamSpec::optional("email", ParamKind::String, "Email"),
            ];
            PARAMS
        }

        fn required_any(&self) -> &'static [&'static [&'static str]] {
            &[&["phone", "email"]]
        }

        async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
            let message = args.get_string("message")?;
            Ok(ToolOutput::success(message))
        }
    }

    fn params(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_registry_basic() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        assert!(registry.has_tool("echo"));
        assert!(!registry.has_tool("nonexistent"));
        assert_eq!(registry.list_tools(), vec!["echo"]);
    }

    #[test]
    fn test_validate_missing_required() {
        let err = ToolRegistry::validate(&EchoTool, &params(json!({"phone": "+1"}))).unwrap_err();
        assert!(matches!(err, ToolError::MissingParameter(ref p) if p == "message"));

        let err = ToolRegistry::validate(&EchoTool, &params(json!({"message": "  ", "phone": "+1"})))
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingParameter(_)));
    }

    #[test]
    fn test_validate_required_any() {
        let err = ToolRegistry::validate(&EchoTool, &params(json!({"message": "hi"}))).unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: phone or email");

        assert!(ToolRegistry::validate(
            &EchoTool,
            &params(json!({"message": "hi", "email": "a@b.co"}))
        )
        .is_ok());
    }

    #[test]
    fn test_validate_kind_mismatch() {
        let err = ToolRegistry::validate(
            &EchoTool,
            &params(json!({"message": {"nested": true}, "email": "a@b.co"})),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameter { ref name, .. } if name == "message"));
    }

    #[test]
    fn test_function_definition() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let (name, _, schema) = registry.function_definition("echo").unwrap();
        assert_eq!(name, "echo");
        assert_eq!(schema["required"], json!(["message"]));
        assert!(registry.function_definition("missing").is_none());
    }

    #[test]
    fn test_reject_all_keeps_order() {
        let calls: Vec<ToolCall> = serde_json::from_value(json!([
            {"id": "a", "function": {"name": "x"}},
            {"id": "b", "function": {"name": "y"}}
        ]))
        .unwrap();
        let results = reject_all(&calls, "Insufficient balance");
        assert_eq!(results.results.len(), 2);
        assert_eq!(results.results[1].tool_call_id, "b");
        assert_eq!(results.results[0].error.as_deref(), Some("Insufficient balance"));
    }
}
