//! HTTP client for the AI-platform REST API.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::config::VapiConfig;
use crate::error::VapiError;
use crate::types::{
    Assistant, AssistantDraft, BypassCall, BypassCallResponse, Call, FunctionToolSpec,
    ImportPhoneNumber, PhoneNumber, PlatformFile, PlatformTool,
};

#[derive(Clone)]
pub struct VapiClient {
    http: Client,
    config: VapiConfig,
}

impl VapiClient {
    pub fn new(config: VapiConfig) -> Result<Self, VapiError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &VapiConfig {
        &self.config
    }

    /// Attach the shared secret to a body's `server` block, if both exist.
    fn with_server_secret(&self, mut body: Value) -> Value {
        if let (Some(secret), Some(server)) = (
            self.config.server_secret(),
            body.get_mut("server").and_then(Value::as_object_mut),
        ) {
            server.insert("secret".to_string(), json!(secret));
        }
        body
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path)).bearer_auth(self.config.api_key())
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path)).bearer_auth(self.config.api_key())
    }

    fn patch(&self, path: &str) -> RequestBuilder {
        self.http.patch(self.url(path)).bearer_auth(self.config.api_key())
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.http.delete(self.url(path)).bearer_auth(self.config.api_key())
    }

    // Assistants

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_assistant(
        &self,
        draft: &AssistantDraft,
        server_url: Option<&str>,
    ) -> Result<Assistant, VapiError> {
        let assistant: Assistant =
            send_json(self.post("/assistant").json(&self.with_server_secret(draft.to_body(server_url)))).await?;
        info!(assistant_id = %assistant.id, "Created assistant");
        Ok(assistant)
    }

    pub async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant, VapiError> {
        send_json(self.get(&format!("/assistant/{}", assistant_id))).await
    }

    /// Patch arbitrary assistant fields.
    pub async fn update_assistant(
        &self,
        assistant_id: &str,
        patch: &Value,
    ) -> Result<Assistant, VapiError> {
        send_json(self.patch(&format!("/assistant/{}", assistant_id)).json(patch)).await
    }

    #[instrument(skip(self))]
    pub async fn delete_assistant(&self, assistant_id: &str) -> Result<(), VapiError> {
        send_empty(self.delete(&format!("/assistant/{}", assistant_id))).await
    }

    /// Replace the tool ids on the assistant's model, keeping the rest of
    /// the model block as the platform has it.
    #[instrument(skip(self, tool_ids), fields(count = tool_ids.len()))]
    pub async fn set_tool_ids(
        &self,
        assistant_id: &str,
        tool_ids: &[String],
    ) -> Result<Assistant, VapiError> {
        let current = self.get_assistant(assistant_id).await?;
        let mut model = current.model.unwrap_or_else(|| json!({}));
        if let Some(obj) = model.as_object_mut() {
            obj.insert("toolIds".to_string(), json!(tool_ids));
        }
        self.update_assistant(assistant_id, &json!({ "model": model }))
            .await
    }

    // Tools

    #[instrument(skip(self, spec), fields(name = %spec.name))]
    pub async fn create_function_tool(
        &self,
        spec: &FunctionToolSpec,
    ) -> Result<PlatformTool, VapiError> {
        send_json(self.post("/tool").json(&self.with_server_secret(spec.to_body()))).await
    }

    /// Create a knowledge-base query tool over uploaded files.
    #[instrument(skip(self, file_ids))]
    pub async fn create_query_tool(
        &self,
        name: &str,
        description: &str,
        file_ids: &[String],
    ) -> Result<PlatformTool, VapiError> {
        let body = json!({
            "type": "query",
            "function": {"name": name},
            "knowledgeBases": [{
                "provider": "google",
                "name": name,
                "description": description,
                "fileIds": file_ids,
            }],
        });
        send_json(self.post("/tool").json(&body)).await
    }

    #[instrument(skip(self))]
    pub async fn delete_tool(&self, tool_id: &str) -> Result<(), VapiError> {
        send_empty(self.delete(&format!("/tool/{}", tool_id))).await
    }

    // Files

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_file(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<PlatformFile, VapiError> {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        let form = Form::new().part("file", part);
        send_json(self.post("/file").multipart(form)).await
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), VapiError> {
        send_empty(self.delete(&format!("/file/{}", file_id))).await
    }

    // Phone numbers

    #[instrument(skip(self, number), fields(number = %number.number))]
    pub async fn import_phone_number(
        &self,
        number: &ImportPhoneNumber,
    ) -> Result<PhoneNumber, VapiError> {
        send_json(self.post("/phone-number").json(number)).await
    }

    #[instrument(skip(self))]
    pub async fn delete_phone_number(&self, phone_number_id: &str) -> Result<(), VapiError> {
        send_empty(self.delete(&format!("/phone-number/{}", phone_number_id))).await
    }

    // Calls

    /// Start an inbound call whose media the telephony provider bridges
    /// itself. Returns the TwiML to hand back to the provider.
    #[instrument(skip(self, call), fields(assistant_id = %call.assistant_id))]
    pub async fn create_bypass_call(&self, call: &BypassCall) -> Result<String, VapiError> {
        let resp: BypassCallResponse = send_json(self.post("/call").json(&call.to_body())).await?;
        let twiml = resp
            .phone_call_provider_details
            .and_then(|d| d.twiml)
            .filter(|t| !t.trim().is_empty());
        match twiml {
            Some(twiml) => {
                debug!(call_id = %resp.id, "Bypass call created");
                Ok(twiml)
            }
            None => Err(VapiError::MissingTwiml(resp.id)),
        }
    }

    pub async fn list_calls(&self, assistant_id: &str, limit: u32) -> Result<Vec<Call>, VapiError> {
        let req = self
            .get("/call")
            .query(&[("assistantId", assistant_id.to_string()), ("limit", limit.to_string())]);
        send_json(req).await
    }

    pub async fn get_call(&self, call_id: &str) -> Result<Call, VapiError> {
        send_json(self.get(&format!("/call/{}", call_id))).await
    }

    /// Hang up a live call through its control URL, looking the call up
    /// when the payload did not carry one.
    #[instrument(skip(self, call), fields(call_id = %call.id))]
    pub async fn end_call(&self, call: &Call) -> Result<(), VapiError> {
        let control_url = match call.control_url() {
            Some(url) => url.to_string(),
            None => self
                .get_call(&call.id)
                .await?
                .control_url()
                .map(str::to_string)
                .ok_or_else(|| VapiError::NoControlUrl(call.id.clone()))?,
        };

        send_empty(
            self.http
                .post(&control_url)
                .json(&json!({"type": "end-call"})),
        )
        .await?;
        info!("Ended call");
        Ok(())
    }
}

async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, VapiError> {
    let resp = req.send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        warn!(status = status.as_u16(), "Vapi request failed");
        return Err(VapiError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

async fn send_empty(req: RequestBuilder) -> Result<(), VapiError> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "Vapi request failed");
        return Err(VapiError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}
