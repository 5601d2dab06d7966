//! Server messages the platform posts to the dashboard, and the replies
//! it expects.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use tracing::warn;

use crate::types::Call;

/// Header carrying the shared server secret on every server message.
pub const SECRET_HEADER: &str = "x-vapi-secret";

fn secret_digest(secret: &str) -> Option<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET_HEADER.as_bytes()).ok()?;
    mac.update(secret.as_bytes());
    Some(mac)
}

/// Constant-time comparison of the presented secret with the configured one.
pub fn verify_server_secret(expected: &str, presented: Option<&str>) -> bool {
    let (Some(want), Some(got)) = (secret_digest(expected), presented.and_then(secret_digest)) else {
        return false;
    };
    got.verify_slice(&want.finalize().into_bytes()).is_ok()
}

/// Outer wrapper of every server message.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEnvelope {
    pub message: ServerMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(rename = "type", default)]
    pub message_type: String,
    #[serde(default, deserialize_with = "lenient_tool_calls")]
    pub tool_calls: Vec<ToolCall>,
    /// Older payloads carry the calls here instead of `toolCalls`.
    #[serde(default, deserialize_with = "lenient_tool_calls")]
    pub tool_call_list: Vec<ToolCall>,
    #[serde(default)]
    pub call: Option<Call>,
    #[serde(default)]
    pub assistant: Option<AssistantRef>,
    #[serde(default)]
    pub assistant_id: Option<String>,
    /// Reported cost of the call so far, in dollars.
    #[serde(default)]
    pub cost: Option<f64>,
}

impl ServerMessage {
    /// Tool calls from whichever field the payload used.
    pub fn tool_calls(&self) -> &[ToolCall] {
        if self.tool_calls.is_empty() {
            &self.tool_call_list
        } else {
            &self.tool_calls
        }
    }

    /// Assistant the message concerns, from the most specific field present.
    pub fn assistant_id(&self) -> Option<&str> {
        self.call
            .as_ref()
            .and_then(|c| c.assistant_id.as_deref())
            .or(self.assistant.as_ref().and_then(|a| a.id.as_deref()))
            .or(self.assistant_id.as_deref())
    }

    pub fn call_id(&self) -> Option<&str> {
        self.call.as_ref().map(|c| c.id.as_str())
    }

    /// `message.cost`, falling back to `message.call.cost`.
    pub fn reported_cost(&self) -> Option<f64> {
        self.cost.or(self.call.as_ref().and_then(|c| c.cost))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantRef {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub id: String,
    /// Empty name when the entry was malformed.
    #[serde(default)]
    pub function: FunctionCall,
}

impl ToolCall {
    /// Entry whose function could not be read; it still needs an answer.
    pub fn malformed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall::default(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.function.name.trim().is_empty()
    }
}

/// Reads each entry on its own so one bad entry cannot sink the batch.
/// Entries without a string `id` cannot be answered and are dropped.
fn lenient_tool_calls<'de, D>(deserializer: D) -> Result<Vec<ToolCall>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .filter_map(|entry| match ToolCall::deserialize(&entry) {
            Ok(call) => Some(call),
            Err(e) => {
                let id = entry.get("id").and_then(Value::as_str)?;
                warn!(tool_call_id = %id, error = %e, "Malformed tool call entry");
                Some(ToolCall::malformed(id))
            }
        })
        .collect())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: String,
    /// Either an object or a JSON-encoded string of one.
    #[serde(default)]
    pub arguments: Value,
}

impl FunctionCall {
    /// Arguments as an object. Unparseable or non-object arguments are empty.
    pub fn arguments_object(&self) -> Map<String, Value> {
        match &self.arguments {
            Value::Object(map) => map.clone(),
            Value::String(raw) => match serde_json::from_str(raw) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
            _ => Map::new(),
        }
    }
}

/// Reply body for a `tool-calls` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResults {
    pub results: Vec<ToolCallResult>,
}

/// One entry per tool call id. Exactly one of `result` / `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub tool_call_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallResult {
    pub fn ok(tool_call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            result: Some(result.into()),
            error: None,
        }
    }

    pub fn err(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            result: None,
            error: Some(error.into()),
        }
    }
}
