//! Phone numbers: buy or import a telephony number, register it with the AI
//! platform, route its webhooks here, and tear all three down again.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::assistant as linkage;
use database::models::NumberDetail;
use database::number;
use database::validation::normalize_phone;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use twilio_client::{AvailableNumber, IncomingNumber, NumberWebhooks};
use vapi_client::ImportPhoneNumber;

use crate::auth::AuthUser;
use crate::envelope::Envelope;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_COUNTRY: &str = "US";
const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Webhooks pointing a number's voice and SMS traffic at this server.
fn webhooks_for(state: &AppState, account_id: &str, assistant_id: &str) -> NumberWebhooks {
    let voice_url = state
        .config
        .public(&format!("/webhooks/twilio/{}/{}", account_id, assistant_id));
    NumberWebhooks {
        sms_url: Some(format!("{}/sms", voice_url)),
        voice_url,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableQuery {
    pub country: Option<String>,
    pub area_code: Option<String>,
    pub limit: Option<u32>,
}

pub async fn available(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, assistant_id)): Path<(String, String)>,
    Query(query): Query<AvailableQuery>,
) -> ApiResult<Vec<AvailableNumber>> {
    linkage::get_assistant(state.db.pool(), &auth.user_id, &account_id, &assistant_id).await?;

    let country = query
        .country
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_COUNTRY)
        .to_uppercase();
    let area_code = query.area_code.as_deref().map(str::trim).filter(|a| !a.is_empty());
    if area_code.is_some_and(|a| !a.chars().all(|c| c.is_ascii_digit())) {
        return Err(ApiError::Validation("areaCode must be numeric".to_string()));
    }
    let limit = query.limit.map(|l| l.clamp(1, 50)).unwrap_or(DEFAULT_SEARCH_LIMIT);

    let numbers = state.twilio.available_numbers(&country, area_code, limit).await?;
    Ok(Envelope::ok("OK", numbers))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberRequest {
    pub phone_number: String,
}

/// Register `incoming` with the AI platform, re-point its webhooks and
/// record it.
async fn attach_number(
    state: &AppState,
    account_id: &str,
    assistant_id: &str,
    assistant_name: &str,
    incoming: &IncomingNumber,
) -> Result<NumberDetail, ApiError> {
    let twilio = state.twilio.config();
    let imported = state
        .vapi
        .import_phone_number(&ImportPhoneNumber {
            provider: "twilio".to_string(),
            number: incoming.phone_number.clone(),
            twilio_account_sid: twilio.account_sid.clone(),
            twilio_auth_token: twilio.auth_token().to_string(),
            assistant_id: assistant_id.to_string(),
            name: Some(assistant_name.to_string()),
        })
        .await?;

    let linked = async {
        // The platform import rewrites the number's webhooks to its own.
        state
            .twilio
            .update_webhooks(&incoming.sid, &webhooks_for(state, account_id, assistant_id))
            .await?;
        number::add_number(
            state.db.pool(),
            assistant_id,
            &incoming.phone_number,
            &imported.id,
            &incoming.sid,
        )
        .await?;
        Ok::<_, ApiError>(())
    }
    .await;

    if let Err(e) = linked {
        if let Err(cleanup) = state.vapi.delete_phone_number(&imported.id).await {
            warn!(phone_number_id = %imported.id, error = %cleanup, "Orphaned platform number");
        }
        return Err(e);
    }
    Ok(number::get_number(state.db.pool(), assistant_id, &incoming.phone_number).await?)
}

/// Buy a number and attach it. The purchase is released again when the
/// number cannot be attached.
pub async fn purchase(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, assistant_id)): Path<(String, String)>,
    Json(req): Json<NumberRequest>,
) -> Result<(StatusCode, Envelope<NumberDetail>), ApiError> {
    let pool = state.db.pool();
    let local = linkage::get_assistant(pool, &auth.user_id, &account_id, &assistant_id).await?;
    let phone = normalize_phone(&req.phone_number)?;
    if number::number_exists(pool, &phone).await? {
        return Err(ApiError::Conflict(format!("{} is already in use", phone)));
    }

    let bought = state
        .twilio
        .buy_number(&phone, &webhooks_for(&state, &account_id, &assistant_id))
        .await?;
    info!(user_id = %auth.user_id, %assistant_id, phone = %bought.phone_number, sid = %bought.sid, "Number purchased");

    match attach_number(&state, &account_id, &assistant_id, &local.name, &bought).await {
        Ok(detail) => Ok((StatusCode::CREATED, Envelope::ok("Number purchased", detail))),
        Err(e) => {
            if let Err(release) = state.twilio.release_number(&bought.sid).await {
                error!(sid = %bought.sid, error = %release, "Purchased number could not be released");
            }
            Err(e)
        }
    }
}

/// Attach a number the telephony account already owns.
pub async fn import(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, assistant_id)): Path<(String, String)>,
    Json(req): Json<NumberRequest>,
) -> Result<(StatusCode, Envelope<NumberDetail>), ApiError> {
    let pool = state.db.pool();
    let local = linkage::get_assistant(pool, &auth.user_id, &account_id, &assistant_id).await?;
    let phone = normalize_phone(&req.phone_number)?;
    if number::number_exists(pool, &phone).await? {
        return Err(ApiError::Conflict(format!("{} is already in use", phone)));
    }

    let incoming = state
        .twilio
        .find_incoming_number(&phone)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("{} is not owned by the telephony account", phone))
        })?;

    let detail = attach_number(&state, &account_id, &assistant_id, &local.name, &incoming).await?;
    info!(user_id = %auth.user_id, %assistant_id, phone = %detail.phone_num, "Number imported");
    Ok((StatusCode::CREATED, Envelope::ok("Number imported", detail)))
}

/// Outcome of one removal step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum Step {
    Removed,
    /// The vendor had no record of it anymore.
    AlreadyGone,
    Failed(String),
    Skipped,
}

impl Step {
    fn succeeded(&self) -> bool {
        matches!(self, Step::Removed | Step::AlreadyGone)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletionSteps {
    pub platform: Step,
    pub telephony: Step,
    pub local: Step,
}

/// Remove a number from the AI platform, the telephony provider and the
/// local store. The local row is only removed when both vendors are done
/// with it, so a retry can finish the job.
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, assistant_id, phone)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let pool = state.db.pool();
    linkage::get_assistant(pool, &auth.user_id, &account_id, &assistant_id).await?;
    let phone = normalize_phone(&phone)?;
    let detail = number::get_number(pool, &assistant_id, &phone).await?;

    let platform = match state.vapi.delete_phone_number(&detail.vapi_phone_num_id).await {
        Ok(()) => Step::Removed,
        Err(e) if e.is_not_found() => Step::AlreadyGone,
        Err(e) => {
            warn!(%phone, error = %e, "Platform number removal failed");
            Step::Failed(e.to_string())
        }
    };
    let telephony = match state.twilio.release_number(&detail.phone_sid).await {
        Ok(()) => Step::Removed,
        Err(e) if e.is_not_found() => Step::AlreadyGone,
        Err(e) => {
            warn!(%phone, error = %e, "Telephony number release failed");
            Step::Failed(e.to_string())
        }
    };

    let local = if platform.succeeded() && telephony.succeeded() {
        number::delete_number(pool, &assistant_id, &phone).await?;
        Step::Removed
    } else {
        Step::Skipped
    };

    let steps = DeletionSteps {
        platform,
        telephony,
        local,
    };
    if steps.local == Step::Removed {
        info!(user_id = %auth.user_id, %assistant_id, %phone, "Number removed");
        return Ok(Envelope::ok("Number removed", steps).into_response());
    }

    let failed: Vec<&str> = [("AI platform", &steps.platform), ("telephony provider", &steps.telephony)]
        .into_iter()
        .filter(|(_, step)| !step.succeeded())
        .map(|(name, _)| name)
        .collect();
    let message = format!(
        "Number not removed from {}; it is still attached locally",
        failed.join(" and ")
    );
    Ok((
        StatusCode::BAD_GATEWAY,
        Envelope::fail(message, Some(json!({ "steps": steps }))),
    )
        .into_response())
}
