//! Assistant management: the platform-side assistant plus its local linkage
//! (tools, knowledge base, team notes) and call history.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use database::assistant::{self as linkage, NewAssistant};
use database::models::{
    Assistant, AssistantChanges, ConnectedTool, KnowledgeBaseTool, NumberDetail, TeamNote,
};
use database::{number, sub_account};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use vapi_client::{AssistantDraft, Call, FunctionToolSpec, PlatformFile};

use crate::auth::AuthUser;
use crate::envelope::Envelope;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const TOOL_WEBHOOK: &str = "/webhooks/vapi/tools";
const BILLING_WEBHOOK: &str = "/webhooks/vapi/billing";

const CALL_LOG_CONCURRENCY: usize = 5;
const DEFAULT_CALL_LIMIT: u32 = 20;
const DEFAULT_NOTE_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssistantRequest {
    #[serde(flatten)]
    pub draft: AssistantDraft,
    #[serde(default)]
    pub calendar_id: Option<String>,
    #[serde(default)]
    pub dynamic_greeting: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

pub async fn list_assistants(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(account_id): Path<String>,
) -> ApiResult<Vec<Assistant>> {
    let pool = state.db.pool();
    sub_account::get_connected_sub_account(pool, &auth.user_id, &account_id).await?;
    let assistants = linkage::list_assistants(pool, &auth.user_id, &account_id).await?;
    Ok(Envelope::ok("OK", assistants))
}

/// Create the assistant on the platform, then link it locally. A failed
/// link removes the platform assistant again.
pub async fn create_assistant(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(account_id): Path<String>,
    Json(mut req): Json<CreateAssistantRequest>,
) -> Result<(StatusCode, Envelope<Assistant>), ApiError> {
    req.draft.name = req.draft.name.trim().to_string();
    if req.draft.name.is_empty() {
        return Err(ApiError::Validation("Assistant name is required".to_string()));
    }
    let pool = state.db.pool();
    sub_account::get_connected_sub_account(pool, &auth.user_id, &account_id).await?;

    let platform = state
        .vapi
        .create_assistant(&req.draft, Some(&state.config.public(BILLING_WEBHOOK)))
        .await?;

    let new = NewAssistant {
        assistant_id: platform.id.clone(),
        user_id: auth.user_id.clone(),
        account_id: account_id.clone(),
        name: req.draft.name.clone(),
        calendar_id: req.calendar_id.filter(|c| !c.is_empty()),
        dynamic_greeting: req.dynamic_greeting.filter(|g| !g.trim().is_empty()),
        timezone: req.timezone.filter(|t| !t.is_empty()),
    };
    match linkage::create_assistant(pool, &new).await {
        Ok(created) => {
            info!(user_id = %auth.user_id, %account_id, assistant_id = %created.assistant_id, "Assistant created");
            Ok((StatusCode::CREATED, Envelope::ok("Assistant created", created)))
        }
        Err(e) => {
            if let Err(cleanup) = state.vapi.delete_assistant(&platform.id).await {
                warn!(assistant_id = %platform.id, error = %cleanup, "Orphaned platform assistant");
            }
            Err(e.into())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssistantDetail {
    #[serde(flatten)]
    pub linkage: Assistant,
    pub platform: vapi_client::Assistant,
    pub numbers: Vec<NumberDetail>,
    pub tools: Vec<ConnectedTool>,
    pub knowledge_base: Vec<KnowledgeBaseTool>,
}

pub async fn get_assistant(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, assistant_id)): Path<(String, String)>,
) -> ApiResult<AssistantDetail> {
    let pool = state.db.pool();
    let local = linkage::get_assistant(pool, &auth.user_id, &account_id, &assistant_id).await?;
    let platform = state.vapi.get_assistant(&assistant_id).await?;

    let detail = AssistantDetail {
        numbers: number::list_numbers(pool, &assistant_id).await?,
        tools: linkage::list_tools(pool, &assistant_id).await?,
        knowledge_base: linkage::list_kb_tools(pool, &assistant_id).await?,
        linkage: local,
        platform,
    };
    Ok(Envelope::ok("OK", detail))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssistantRequest {
    /// Version the client last read.
    pub version: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub calendar_id: Option<String>,
    #[serde(default)]
    pub dynamic_greeting: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub first_message: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl UpdateAssistantRequest {
    /// Fields the platform holds, as a patch body. `None` when untouched.
    fn platform_patch(&self, current: &vapi_client::Assistant) -> Option<Value> {
        let mut patch = Map::new();
        if let Some(name) = &self.name {
            patch.insert("name".to_string(), json!(name));
        }
        if let Some(first) = &self.first_message {
            patch.insert("firstMessage".to_string(), json!(first));
        }
        if let Some(prompt) = &self.system_prompt {
            let mut model = current.model.clone().unwrap_or_else(|| json!({}));
            if let Some(obj) = model.as_object_mut() {
                obj.insert(
                    "messages".to_string(),
                    json!([{"role": "system", "content": prompt}]),
                );
            }
            patch.insert("model".to_string(), model);
        }
        (!patch.is_empty()).then_some(Value::Object(patch))
    }
}

/// Update an assistant. Stale `version`s are refused before anything is
/// sent to the platform.
pub async fn update_assistant(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, assistant_id)): Path<(String, String)>,
    Json(req): Json<UpdateAssistantRequest>,
) -> ApiResult<Assistant> {
    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::Validation("Assistant name cannot be empty".to_string()));
    }
    let pool = state.db.pool();
    let local = linkage::get_assistant(pool, &auth.user_id, &account_id, &assistant_id).await?;
    if local.version != req.version {
        return Err(database::DatabaseError::Conflict {
            entity: "Assistant",
            id: assistant_id,
        }
        .into());
    }

    let needs_platform = req.name.is_some() || req.first_message.is_some() || req.system_prompt.is_some();
    if needs_platform {
        let current = state.vapi.get_assistant(&assistant_id).await?;
        if let Some(patch) = req.platform_patch(&current) {
            state.vapi.update_assistant(&assistant_id, &patch).await?;
        }
    }

    let changes = AssistantChanges {
        name: req.name.map(|n| n.trim().to_string()),
        calendar_id: req.calendar_id,
        dynamic_greeting: req.dynamic_greeting,
        timezone: req.timezone,
    };
    let updated = linkage::update_assistant(
        pool,
        &auth.user_id,
        &account_id,
        &assistant_id,
        req.version,
        &changes,
    )
    .await?;
    Ok(Envelope::ok("Assistant updated", updated))
}

pub async fn delete_assistant(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, assistant_id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let pool = state.db.pool();
    linkage::get_assistant(pool, &auth.user_id, &account_id, &assistant_id).await?;
    if !number::list_numbers(pool, &assistant_id).await?.is_empty() {
        return Err(ApiError::Conflict(
            "Remove the assistant's phone numbers first".to_string(),
        ));
    }

    match state.vapi.delete_assistant(&assistant_id).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            warn!(%assistant_id, "Assistant already gone from platform");
        }
        Err(e) => return Err(e.into()),
    }
    linkage::delete_assistant(pool, &auth.user_id, &account_id, &assistant_id).await?;
    info!(user_id = %auth.user_id, %assistant_id, "Assistant deleted");
    Ok(Envelope::done("Assistant deleted"))
}

// Function tools

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToolRequest {
    pub tool_name: String,
}

/// Register one of the dashboard's tools on the platform and attach it.
pub async fn add_tool(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, assistant_id)): Path<(String, String)>,
    Json(req): Json<AddToolRequest>,
) -> Result<(StatusCode, Envelope<ConnectedTool>), ApiError> {
    let pool = state.db.pool();
    linkage::get_assistant(pool, &auth.user_id, &account_id, &assistant_id).await?;

    let (name, description, parameters) = state
        .tools
        .function_definition(req.tool_name.trim())
        .ok_or_else(|| ApiError::Validation(format!("Unknown tool: {}", req.tool_name)))?;
    let connected = linkage::list_tools(pool, &assistant_id).await?;
    if connected.iter().any(|t| t.tool_name == name) {
        return Err(ApiError::Conflict(format!("{} is already connected", name)));
    }

    let spec = FunctionToolSpec {
        name: name.clone(),
        description,
        parameters,
        server_url: state.config.public(TOOL_WEBHOOK),
    };
    let tool = state.vapi.create_function_tool(&spec).await?;

    let attached = async {
        let platform = state.vapi.get_assistant(&assistant_id).await?;
        let mut ids = platform.tool_ids();
        ids.push(tool.id.clone());
        state.vapi.set_tool_ids(&assistant_id, &ids).await?;
        Ok::<_, ApiError>(())
    }
    .await;
    if let Err(e) = attached {
        if let Err(cleanup) = state.vapi.delete_tool(&tool.id).await {
            warn!(tool_id = %tool.id, error = %cleanup, "Orphaned platform tool");
        }
        return Err(e);
    }

    linkage::link_tool(pool, &assistant_id, &tool.id, &name).await?;
    let linked = linkage::list_tools(pool, &assistant_id)
        .await?
        .into_iter()
        .find(|t| t.tool_id == tool.id)
        .ok_or_else(|| ApiError::Internal("linked tool vanished".to_string()))?;
    info!(%assistant_id, tool = %name, tool_id = %tool.id, "Tool connected");
    Ok((StatusCode::CREATED, Envelope::ok("Tool connected", linked)))
}

/// Detach `tool_id` from the platform assistant's model.
async fn detach_tool(state: &AppState, assistant_id: &str, tool_id: &str) -> Result<(), ApiError> {
    let platform = state.vapi.get_assistant(assistant_id).await?;
    let ids: Vec<String> = platform
        .tool_ids()
        .into_iter()
        .filter(|id| id != tool_id)
        .collect();
    state.vapi.set_tool_ids(assistant_id, &ids).await?;
    match state.vapi.delete_tool(tool_id).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn remove_tool(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, assistant_id, tool_id)): Path<(String, String, String)>,
) -> ApiResult<Value> {
    let pool = state.db.pool();
    linkage::get_assistant(pool, &auth.user_id, &account_id, &assistant_id).await?;
    let connected = linkage::list_tools(pool, &assistant_id).await?;
    if !connected.iter().any(|t| t.tool_id == tool_id) {
        return Err(ApiError::NotFound(format!("Tool {} not found", tool_id)));
    }

    detach_tool(&state, &assistant_id, &tool_id).await?;
    linkage::unlink_tool(pool, &assistant_id, &tool_id).await?;
    info!(%assistant_id, %tool_id, "Tool disconnected");
    Ok(Envelope::done("Tool disconnected"))
}

// Knowledge base

struct Upload {
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
}

fn bad_upload(e: impl std::fmt::Display) -> ApiError {
    ApiError::Validation(format!("Invalid upload: {}", e))
}

/// Upload a document and expose it to the assistant as a query tool.
///
/// Multipart fields: `file` (required), `name` and `description`.
pub async fn upload_knowledge_base(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, assistant_id)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Envelope<KnowledgeBaseTool>), ApiError> {
    let pool = state.db.pool();
    linkage::get_assistant(pool, &auth.user_id, &account_id, &assistant_id).await?;

    let mut upload = None;
    let mut name = None;
    let mut description = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_upload)?.to_vec();
                upload = Some(Upload {
                    filename,
                    content_type,
                    bytes,
                });
            }
            Some("name") => name = Some(field.text().await.map_err(bad_upload)?),
            Some("description") => description = Some(field.text().await.map_err(bad_upload)?),
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::Validation("A file is required".to_string()))?;
    if upload.bytes.is_empty() {
        return Err(ApiError::Validation("The file is empty".to_string()));
    }
    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| knowledge_base_name(&upload.filename));
    let description = description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("Answers questions using {}", upload.filename));

    let file: PlatformFile = state
        .vapi
        .upload_file(&upload.filename, &upload.content_type, upload.bytes)
        .await?;

    let attached = async {
        let tool = state
            .vapi
            .create_query_tool(&name, &description, std::slice::from_ref(&file.id))
            .await?;
        let platform = state.vapi.get_assistant(&assistant_id).await?;
        let mut ids = platform.tool_ids();
        ids.push(tool.id.clone());
        state.vapi.set_tool_ids(&assistant_id, &ids).await?;
        Ok::<_, ApiError>(tool)
    }
    .await;
    let tool = match attached {
        Ok(tool) => tool,
        Err(e) => {
            if let Err(cleanup) = state.vapi.delete_file(&file.id).await {
                warn!(file_id = %file.id, error = %cleanup, "Orphaned platform file");
            }
            return Err(e);
        }
    };

    linkage::link_kb_tool(pool, &assistant_id, &tool.id, Some(&file.id), &name).await?;
    let linked = linkage::list_kb_tools(pool, &assistant_id)
        .await?
        .into_iter()
        .find(|t| t.tool_id == tool.id)
        .ok_or_else(|| ApiError::Internal("linked knowledge base vanished".to_string()))?;
    info!(%assistant_id, tool_id = %tool.id, file_id = %file.id, "Knowledge base added");
    Ok((StatusCode::CREATED, Envelope::ok("Knowledge base added", linked)))
}

/// Tool names are restricted to `[a-zA-Z0-9_-]` on the platform.
fn knowledge_base_name(filename: &str) -> String {
    let stem = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(40)
        .collect();
    format!("kb_{}", cleaned.trim_matches('_').to_lowercase())
}

pub async fn delete_knowledge_base(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, assistant_id, tool_id)): Path<(String, String, String)>,
) -> ApiResult<Value> {
    let pool = state.db.pool();
    linkage::get_assistant(pool, &auth.user_id, &account_id, &assistant_id).await?;
    let kb = linkage::list_kb_tools(pool, &assistant_id)
        .await?
        .into_iter()
        .find(|t| t.tool_id == tool_id)
        .ok_or_else(|| ApiError::NotFound(format!("Knowledge base {} not found", tool_id)))?;

    detach_tool(&state, &assistant_id, &tool_id).await?;
    if let Some(file_id) = &kb.file_id {
        match state.vapi.delete_file(file_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(%file_id, error = %e, "Knowledge base file not deleted"),
        }
    }
    linkage::unlink_kb_tool(pool, &assistant_id, &tool_id).await?;
    info!(%assistant_id, %tool_id, "Knowledge base removed");
    Ok(Envelope::done("Knowledge base removed"))
}

// History

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

pub async fn team_notes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, assistant_id)): Path<(String, String)>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<TeamNote>> {
    let pool = state.db.pool();
    linkage::get_assistant(pool, &auth.user_id, &account_id, &assistant_id).await?;
    let limit = query
        .limit
        .map(|l| i64::from(l.clamp(1, 200)))
        .unwrap_or(DEFAULT_NOTE_LIMIT);
    let notes = linkage::list_team_notes(pool, &assistant_id, limit).await?;
    Ok(Envelope::ok("OK", notes))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantCalls {
    pub assistant_id: String,
    pub assistant_name: String,
    pub calls: Vec<Call>,
    /// Set when the platform could not be queried for this assistant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Recent calls of every assistant in the sub-account, fetched a few
/// assistants at a time.
pub async fn call_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(account_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<AssistantCalls>> {
    let pool = state.db.pool();
    sub_account::get_connected_sub_account(pool, &auth.user_id, &account_id).await?;
    let assistants = linkage::list_assistants(pool, &auth.user_id, &account_id).await?;
    let limit = query.limit.map(|l| l.clamp(1, 100)).unwrap_or(DEFAULT_CALL_LIMIT);

    let vapi = &state.vapi;
    let mut logs: Vec<AssistantCalls> = stream::iter(assistants)
        .map(|a| async move {
            match vapi.list_calls(&a.assistant_id, limit).await {
                Ok(calls) => AssistantCalls {
                    assistant_id: a.assistant_id,
                    assistant_name: a.name,
                    calls,
                    error: None,
                },
                Err(e) => {
                    warn!(assistant_id = %a.assistant_id, error = %e, "Call history unavailable");
                    AssistantCalls {
                        assistant_id: a.assistant_id,
                        assistant_name: a.name,
                        calls: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .buffer_unordered(CALL_LOG_CONCURRENCY)
        .collect()
        .await;

    logs.sort_by(|a, b| a.assistant_name.cmp(&b.assistant_name));
    Ok(Envelope::ok("OK", logs))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDetail {
    #[serde(flatten)]
    pub call: Call,
    /// What the telephony provider charged for the call leg, once priced.
    pub telephony_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telephony_cost_unit: Option<String>,
}

/// One call with its telephony charge. A missing price is reported as
/// `null` rather than failing the request.
pub async fn call_detail(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, assistant_id, call_id)): Path<(String, String, String)>,
) -> ApiResult<CallDetail> {
    linkage::get_assistant(state.db.pool(), &auth.user_id, &account_id, &assistant_id).await?;
    let call = match state.vapi.get_call(&call_id).await {
        Ok(call) => call,
        Err(e) if e.is_not_found() => {
            return Err(ApiError::NotFound(format!("Call {} not found", call_id)))
        }
        Err(e) => return Err(e.into()),
    };
    if call.assistant_id.as_deref() != Some(assistant_id.as_str()) {
        return Err(ApiError::NotFound(format!("Call {} not found", call_id)));
    }

    let record = match call.phone_call_provider_id.as_deref() {
        Some(sid) => match state.twilio.get_call(sid).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(%call_id, %sid, error = %e, "Telephony cost unavailable");
                None
            }
        },
        None => None,
    };
    let detail = CallDetail {
        telephony_cost: record.as_ref().and_then(|r| r.charge()),
        telephony_cost_unit: record.and_then(|r| r.price_unit),
        call,
    };
    Ok(Envelope::ok("OK", detail))
}
