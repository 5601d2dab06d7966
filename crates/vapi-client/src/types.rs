//! REST resource types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Fields the dashboard sets when creating an assistant. The platform holds
/// the full configuration; this only covers what the create form collects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantDraft {
    pub name: String,
    #[serde(default)]
    pub first_message: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Model provider, e.g. `openai`.
    #[serde(default)]
    pub model_provider: Option<String>,
    /// Model name, e.g. `gpt-4o`.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub voice_provider: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
}

impl AssistantDraft {
    /// Render the platform's request body.
    pub fn to_body(&self, server_url: Option<&str>) -> Value {
        let mut model = json!({
            "provider": self.model_provider.as_deref().unwrap_or("openai"),
            "model": self.model.as_deref().unwrap_or("gpt-4o"),
        });
        if let Some(prompt) = &self.system_prompt {
            model["messages"] = json!([{"role": "system", "content": prompt}]);
        }

        let mut body = json!({ "name": self.name, "model": model });
        if let Some(first) = &self.first_message {
            body["firstMessage"] = json!(first);
        }
        if let (Some(provider), Some(voice_id)) = (&self.voice_provider, &self.voice_id) {
            body["voice"] = json!({"provider": provider, "voiceId": voice_id});
        }
        if let Some(url) = server_url {
            body["server"] = json!({"url": url});
        }
        body
    }
}

/// An assistant as returned by the platform.
///
/// Only the fields the dashboard reads are typed; the rest is kept in
/// `extra` so that round-tripping the model block loses nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub first_message: Option<String>,
    #[serde(default)]
    pub model: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Assistant {
    /// Tool ids currently attached to the assistant's model.
    pub fn tool_ids(&self) -> Vec<String> {
        self.model
            .as_ref()
            .and_then(|m| m.get("toolIds"))
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A tool registered on the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformTool {
    pub id: String,
    #[serde(rename = "type", default)]
    pub tool_type: Option<String>,
    #[serde(default)]
    pub function: Option<Value>,
}

/// Definition of a function tool whose calls are posted to `server_url`.
#[derive(Debug, Clone)]
pub struct FunctionToolSpec {
    pub name: String,
    pub description: String,
    /// JSON-schema object for the arguments.
    pub parameters: Value,
    pub server_url: String,
}

impl FunctionToolSpec {
    pub(crate) fn to_body(&self) -> Value {
        json!({
            "type": "function",
            "async": false,
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            },
            "server": {"url": self.server_url},
        })
    }
}

/// An uploaded knowledge-base file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Body for `POST /phone-number` importing a telephony-provider number.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPhoneNumber {
    pub provider: String,
    pub number: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub assistant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumber {
    pub id: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub assistant_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Live-call control endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    #[serde(default)]
    pub control_url: Option<String>,
    #[serde(default)]
    pub listen_url: Option<String>,
}

/// A call record. Present both in REST responses and in server messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub id: String,
    #[serde(default)]
    pub assistant_id: Option<String>,
    #[serde(default)]
    pub phone_number_id: Option<String>,
    #[serde(rename = "type", default)]
    pub call_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(default)]
    pub ended_reason: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    /// Telephony provider's id for the call leg (a Twilio call SID).
    #[serde(default)]
    pub phone_call_provider_id: Option<String>,
    #[serde(default)]
    pub customer: Option<Customer>,
    #[serde(default)]
    pub monitor: Option<Monitor>,
    #[serde(default)]
    pub analysis: Option<Value>,
    #[serde(default)]
    pub artifact: Option<Value>,
}

impl Call {
    pub fn control_url(&self) -> Option<&str> {
        self.monitor.as_ref()?.control_url.as_deref()
    }

    pub fn customer_number(&self) -> Option<&str> {
        self.customer.as_ref()?.number.as_deref()
    }

    /// Post-call summary, when analysis ran.
    pub fn summary(&self) -> Option<&str> {
        self.analysis.as_ref()?.get("summary")?.as_str()
    }
}

/// Request for a provider-bypass inbound call.
#[derive(Debug, Clone)]
pub struct BypassCall {
    pub assistant_id: String,
    pub phone_number_id: String,
    pub customer_number: String,
    /// Overrides the assistant's first message for this call.
    pub first_message: Option<String>,
}

impl BypassCall {
    pub(crate) fn to_body(&self) -> Value {
        let mut body = json!({
            "phoneCallProviderBypassEnabled": true,
            "phoneNumberId": self.phone_number_id,
            "assistantId": self.assistant_id,
            "customer": {"number": self.customer_number},
        });
        if let Some(first) = &self.first_message {
            body["assistantOverrides"] = json!({"firstMessage": first});
        }
        body
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BypassCallResponse {
    pub id: String,
    #[serde(default)]
    pub phone_call_provider_details: Option<ProviderDetails>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProviderDetails {
    #[serde(default)]
    pub twiml: Option<String>,
}
