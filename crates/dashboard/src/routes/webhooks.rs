//! Vendor-facing webhook receivers.
//!
//! Vendors retry on non-2xx, so every handler here answers 200 with a
//! parseable body, failures included. The exceptions are requests that
//! fail authentication: a payment event whose signature does not verify
//! gets a 400, a server message without the shared secret a 401, and a
//! telephony request without a valid signature a 403.

use std::sync::Arc;

use agent_tools::{reject_all, CallScope, ToolContext};
use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::models::Assistant;
use database::validation::normalize_phone;
use database::{assistant, billing, number, sub_account, user, ChargeOutcome, PaymentOutcome};
use serde_json::Value;
use stripe_client::{construct_event, Event, StripeError};
use tracing::{debug, error, info, warn};
use twilio_client::{twiml, verify_request, SIGNATURE_HEADER};
use vapi_client::{
    verify_server_secret, BypassCall, Call, ServerEnvelope, ServerMessage, ToolResults,
    SECRET_HEADER,
};

use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::greeting;
use crate::state::AppState;

/// Lifecycle events that carry a chargeable cost.
pub const BILLABLE_EVENTS: [&str; 3] = ["call.ended", "call.analysis.completed", "end-of-call-report"];

pub const INSUFFICIENT_FUNDS_MESSAGE: &str =
    "Insufficient wallet balance. Please top up to continue using this assistant.";

const UNKNOWN_ASSISTANT_MESSAGE: &str = "Unknown assistant";

// Telephony

/// The form fields read from an inbound call or SMS.
#[derive(Debug, Default)]
pub struct InboundForm {
    pub from: String,
    pub to: String,
    pub call_sid: Option<String>,
    pub body: Option<String>,
}

impl InboundForm {
    fn from_params(params: &[(String, String)]) -> Self {
        let field = |name: &str| {
            params
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        };
        Self {
            from: field("From").unwrap_or_default(),
            to: field("To").unwrap_or_default(),
            call_sid: field("CallSid"),
            body: field("Body"),
        }
    }
}

/// Form parameters of a telephony request whose signature checks out.
///
/// Twilio signs the URL it was configured with, which is this server's
/// public URL plus the request path.
fn signed_params(
    state: &AppState,
    uri: &OriginalUri,
    headers: &HeaderMap,
    body: &[u8],
) -> Option<Vec<(String, String)>> {
    let params: Vec<(String, String)> = url::form_urlencoded::parse(body).into_owned().collect();
    let path = uri
        .0
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or_else(|| uri.0.path());
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let auth_token = state.twilio.config().auth_token();
    verify_request(auth_token, &state.config.public(path), &params, signature).then_some(params)
}

fn forbidden_twiml() -> Response {
    (
        StatusCode::FORBIDDEN,
        [(header::CONTENT_TYPE, "text/xml")],
        twiml::empty(),
    )
        .into_response()
}

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

/// Inbound call: hand the call to the assistant and relay the platform's
/// voice response.
pub async fn twilio_voice(
    State(state): State<AppState>,
    Path((account_id, assistant_id)): Path<(String, String)>,
    uri: OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(params) = signed_params(&state, &uri, &headers, &body) else {
        warn!(%account_id, %assistant_id, "Rejected unsigned inbound call");
        return forbidden_twiml();
    };
    let form = InboundForm::from_params(&params);

    match connect_call(&state, &account_id, &assistant_id, &form).await {
        Ok(response) => {
            info!(%assistant_id, from = %form.from, to = %form.to, "Inbound call connected");
            xml(response)
        }
        Err(e) => {
            warn!(%account_id, %assistant_id, call_sid = ?form.call_sid, error = %e, "Inbound call setup failed");
            xml(twiml::connect_error())
        }
    }
}

async fn connect_call(
    state: &AppState,
    account_id: &str,
    assistant_id: &str,
    form: &InboundForm,
) -> Result<String, ApiError> {
    let pool = state.db.pool();
    let linked = assistant::find_assistant(pool, assistant_id)
        .await?
        .filter(|a| a.account_id == account_id)
        .ok_or_else(|| ApiError::NotFound(format!("Assistant {} not found", assistant_id)))?;
    sub_account::get_connected_sub_account(pool, &linked.user_id, account_id).await?;
    let dialed = normalize_phone(&form.to).unwrap_or_else(|_| form.to.trim().to_string());
    let detail = number::get_number(pool, assistant_id, &dialed).await?;

    let first_message = match linked.dynamic_greeting.as_deref() {
        Some(template) if !template.trim().is_empty() => {
            Some(render_greeting(state, &linked, template, &form.from).await)
        }
        _ => None,
    };

    let call = BypassCall {
        assistant_id: assistant_id.to_string(),
        phone_number_id: detail.vapi_phone_num_id,
        customer_number: form.from.clone(),
        first_message,
    };
    Ok(state.vapi.create_bypass_call(&call).await?)
}

/// Greeting for this caller. A failed CRM lookup greets them as unknown
/// instead of dropping the call.
async fn render_greeting(state: &AppState, linked: &Assistant, template: &str, caller: &str) -> String {
    if !template.contains("{{") || caller.is_empty() {
        return greeting::render(template, None, caller);
    }

    let contact = match state
        .broker
        .location_token(&linked.user_id, &linked.account_id)
        .await
    {
        Ok(token) => match state
            .broker
            .ghl()
            .find_contact_by_phone(&token, &linked.account_id, caller)
            .await
        {
            Ok(contact) => contact,
            Err(e) => {
                warn!(assistant_id = %linked.assistant_id, error = %e, "Caller lookup failed");
                None
            }
        },
        Err(e) => {
            warn!(assistant_id = %linked.assistant_id, error = %e, "No CRM token for caller lookup");
            None
        }
    };
    greeting::render(template, contact.as_ref(), caller)
}

/// Inbound SMS. Acknowledged and logged only.
pub async fn twilio_sms(
    State(state): State<AppState>,
    Path((account_id, assistant_id)): Path<(String, String)>,
    uri: OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(params) = signed_params(&state, &uri, &headers, &body) else {
        warn!(%account_id, %assistant_id, "Rejected unsigned inbound SMS");
        return forbidden_twiml();
    };
    let form = InboundForm::from_params(&params);
    info!(
        %account_id,
        %assistant_id,
        from = %form.from,
        length = form.body.as_deref().map(str::len).unwrap_or(0),
        "Inbound SMS received"
    );
    xml(twiml::empty())
}

// AI platform

/// Whether a server message carries the shared secret. Without a
/// configured secret every message is accepted.
fn platform_authorized(state: &AppState, headers: &HeaderMap) -> bool {
    match state.vapi.config().server_secret() {
        Some(expected) => {
            let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
            verify_server_secret(expected, presented)
        }
        None => true,
    }
}

fn parse_server_message(body: &[u8]) -> Option<ServerMessage> {
    match serde_json::from_slice::<ServerEnvelope>(body) {
        Ok(envelope) => Some(envelope.message),
        Err(e) => {
            warn!(error = %e, "Unparseable server message");
            None
        }
    }
}

/// End a live call. Failures are logged; the caller's response does not
/// depend on them.
async fn terminate_call(state: &AppState, call: Option<&Call>) {
    match call {
        Some(call) => match state.vapi.end_call(call).await {
            Ok(()) => info!(call_id = %call.id, "Call terminated for empty wallet"),
            Err(e) => warn!(call_id = %call.id, error = %e, "Call termination failed"),
        },
        None => warn!("No call to terminate"),
    }
}

/// Tool-call webhook. Every tool call id gets exactly one entry back.
pub async fn vapi_tools(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if !platform_authorized(&state, &headers) {
        warn!("Rejected tool calls without the server secret");
        return (StatusCode::UNAUTHORIZED, Json(ToolResults::default())).into_response();
    }
    answer_tool_calls(&state, &body).await.into_response()
}

async fn answer_tool_calls(state: &AppState, body: &[u8]) -> Json<ToolResults> {
    let Some(message) = parse_server_message(body) else {
        return Json(ToolResults::default());
    };
    let calls = message.tool_calls();
    if calls.is_empty() {
        debug!(message_type = %message.message_type, "Server message without tool calls");
        return Json(ToolResults::default());
    }

    let pool = state.db.pool();
    let linked = match message.assistant_id() {
        Some(id) => match assistant::find_assistant(pool, id).await {
            Ok(found) => found,
            Err(e) => {
                error!(assistant_id = %id, error = %e, "Assistant lookup failed");
                return Json(reject_all(calls, "Internal error, please try again"));
            }
        },
        None => None,
    };
    let Some(linked) = linked else {
        warn!(assistant_id = ?message.assistant_id(), "Tool calls for unknown assistant");
        return Json(reject_all(calls, UNKNOWN_ASSISTANT_MESSAGE));
    };

    match user::wallet_balance(pool, &linked.user_id).await {
        Ok(balance) if balance <= 0.0 => {
            info!(user_id = %linked.user_id, balance, "Wallet empty, refusing tool calls");
            terminate_call(state, message.call.as_ref()).await;
            return Json(reject_all(calls, INSUFFICIENT_FUNDS_MESSAGE));
        }
        Ok(_) => {}
        Err(e) => {
            error!(user_id = %linked.user_id, error = %e, "Wallet lookup failed");
            return Json(reject_all(calls, "Internal error, please try again"));
        }
    }

    let scope = CallScope {
        user_id: linked.user_id,
        account_id: linked.account_id,
        assistant_id: linked.assistant_id,
        calendar_id: linked.calendar_id,
        timezone: linked.timezone,
        call_id: message.call_id().map(str::to_string),
        customer_number: message
            .call
            .as_ref()
            .and_then(|c| c.customer_number())
            .map(str::to_string),
    };
    let ctx = Arc::new(ToolContext::new(scope, state.tool_services.clone()));
    Json(state.tools.dispatch(calls, ctx).await)
}

/// Usage webhook. Charges each billable event once.
pub async fn vapi_billing(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if !platform_authorized(&state, &headers) {
        warn!("Rejected billing event without the server secret");
        return (
            StatusCode::UNAUTHORIZED,
            Envelope::fail("Invalid server secret", None),
        )
            .into_response();
    }
    let Some(message) = parse_server_message(&body) else {
        return Envelope::fail("Unparseable message", None).into_response();
    };
    match bill_event(&state, &message).await {
        Ok(outcome) => Envelope::done(outcome).into_response(),
        Err(e) => {
            error!(call_id = ?message.call_id(), event = %message.message_type, error = %e, "Billing failed");
            Envelope::fail("Billing failed", None).into_response()
        }
    }
}

async fn bill_event(state: &AppState, message: &ServerMessage) -> Result<String, ApiError> {
    let event_type = message.message_type.as_str();
    if !BILLABLE_EVENTS.contains(&event_type) {
        return Ok(format!("Ignored {}", event_type));
    }
    let Some(call_id) = message.call_id() else {
        warn!(event = %event_type, "Billable event without a call id");
        return Ok("No call to bill".to_string());
    };

    let pool = state.db.pool();
    let linked = match message.assistant_id() {
        Some(id) => assistant::find_assistant(pool, id).await?,
        None => None,
    };
    let Some(linked) = linked else {
        warn!(%call_id, assistant_id = ?message.assistant_id(), "Billable event for unknown assistant");
        return Ok(UNKNOWN_ASSISTANT_MESSAGE.to_string());
    };

    let balance = user::wallet_balance(pool, &linked.user_id).await?;
    if balance <= 0.0 {
        info!(user_id = %linked.user_id, %call_id, balance, "Wallet empty, terminating call");
        terminate_call(state, message.call.as_ref()).await;
        return Ok("Wallet empty, call terminated".to_string());
    }

    let cost = message.reported_cost().unwrap_or(0.0);
    match billing::record_call_charge(pool, &linked.user_id, call_id, event_type, cost).await? {
        ChargeOutcome::Applied { amount, balance } => {
            info!(user_id = %linked.user_id, %call_id, event = %event_type, amount, balance, "Call charged");
            Ok("Charged".to_string())
        }
        ChargeOutcome::Duplicate => {
            debug!(%call_id, event = %event_type, "Duplicate billing event");
            Ok("Already billed".to_string())
        }
    }
}

// Payments

/// Payment webhook. The signature is verified before the body is parsed.
pub async fn stripe(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());
    let stripe_config = state.stripe.config();

    let event = match construct_event(
        stripe_config.webhook_secret(),
        signature,
        &body,
        stripe_config.tolerance_secs,
    ) {
        Ok(event) => event,
        Err(StripeError::Signature(e)) => {
            warn!(error = %e, "Rejected payment webhook signature");
            return (
                StatusCode::BAD_REQUEST,
                Envelope::fail("Invalid signature", None),
            )
                .into_response();
        }
        Err(e) => {
            warn!(error = %e, "Unparseable payment event");
            return Envelope::fail("Unparseable event", None).into_response();
        }
    };

    match apply_payment_event(&state, &event).await {
        Ok(outcome) => Envelope::done(outcome).into_response(),
        Err(e) => {
            error!(event_id = %event.id, event = %event.event_type, error = %e, "Payment event failed");
            Envelope::fail("Payment event failed", None).into_response()
        }
    }
}

async fn apply_payment_event(state: &AppState, event: &Event) -> Result<String, ApiError> {
    let status = match event.event_type.as_str() {
        "payment_intent.succeeded" => "succeeded",
        "payment_intent.payment_failed" => "failed",
        other => {
            debug!(event = %other, "Ignored payment event");
            return Ok(format!("Ignored {}", other));
        }
    };
    let Some(intent) = event.payment_intent() else {
        warn!(event_id = %event.id, "Payment event without an intent");
        return Ok("No payment intent".to_string());
    };
    let Some(user_id) = intent.user_id() else {
        warn!(intent_id = %intent.id, "Payment intent without a user");
        return Ok("No user on payment".to_string());
    };

    let amount = if status == "succeeded" {
        intent.received_major()
    } else {
        intent.amount as f64 / 100.0
    };
    if status == "failed" {
        warn!(
            %user_id,
            intent_id = %intent.id,
            reason = intent.failure_message().unwrap_or("unknown"),
            "Payment failed"
        );
    }

    let outcome = billing::record_payment(
        state.db.pool(),
        user_id,
        &intent.id,
        amount,
        &intent.currency,
        status,
    )
    .await?;
    match outcome {
        PaymentOutcome::Recorded { balance } => {
            info!(%user_id, intent_id = %intent.id, status, amount, balance, "Payment recorded");
            Ok(format!("Payment {}", status))
        }
        PaymentOutcome::Duplicate => Ok("Already recorded".to_string()),
    }
}
