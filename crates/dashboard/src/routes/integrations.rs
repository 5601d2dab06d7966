//! CRM and payments connections, sub-accounts, saved contacts and wallet.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::Json;
use database::models::{BillingEvent, ContactFields, Payment, SavedContact, SubAccount};
use database::validation::{normalize_phone, validate_email};
use database::{billing, contact, sub_account, user};
use ghl_client::Location;
use stripe_client::Balance;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::config::Config;
use crate::envelope::Envelope;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const PROVIDER_GHL: &str = "ghl";
const PROVIDER_GHL_LOCATION: &str = "ghl_location";
const PROVIDER_STRIPE: &str = "stripe";

const GHL_CALLBACK: &str = "/integrations/ghl/callback";
const GHL_LOCATION_CALLBACK: &str = "/integrations/ghl/sub-account/callback";
const STRIPE_CALLBACK: &str = "/integrations/stripe/callback";

const MIN_TOP_UP: f64 = 1.0;
const HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeUrl {
    pub url: String,
}

fn failure_redirect(config: &Config, message: &str) -> Redirect {
    Redirect::to(&format!(
        "{}/connection-failed?message={}",
        config.frontend_url,
        urlencoding::encode(message)
    ))
}

fn success_redirect(config: &Config, provider: &str) -> Redirect {
    Redirect::to(&format!(
        "{}/integrations?connected={}",
        config.frontend_url, provider
    ))
}

/// Consume the callback's state, then surface a provider-side denial.
async fn verify_callback(
    state: &AppState,
    query: &CallbackQuery,
    provider: &str,
) -> Result<(database::OAuthState, String), ApiError> {
    let raw_state = query
        .state
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization state".to_string()))?;
    let pending = state.broker.finish_authorization(raw_state, provider).await?;

    if let Some(error) = &query.error {
        let detail = query.error_description.as_deref().unwrap_or(error);
        return Err(ApiError::Validation(format!("Authorization denied: {}", detail)));
    }
    let code = query
        .code
        .clone()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing authorization code".to_string()))?;
    Ok((pending, code))
}

fn callback_result(state: &AppState, provider: &str, result: Result<(), ApiError>) -> Redirect {
    match result {
        Ok(()) => success_redirect(&state.config, provider),
        Err(e) => {
            warn!(provider, error = %e, "Authorization callback failed");
            failure_redirect(&state.config, &e.to_string())
        }
    }
}

// Agency CRM

pub async fn ghl_authorize(State(state): State<AppState>, auth: AuthUser) -> ApiResult<AuthorizeUrl> {
    let oauth_state = state
        .broker
        .begin_authorization(&auth.user_id, PROVIDER_GHL, None)
        .await?;
    let url = state
        .broker
        .ghl()
        .config()
        .consent_url(&state.config.public(GHL_CALLBACK), &oauth_state);
    Ok(Envelope::ok("Redirect to authorize", AuthorizeUrl { url }))
}

pub async fn ghl_callback(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> Redirect {
    let result = async {
        let (pending, code) = verify_callback(&state, &query, PROVIDER_GHL).await?;
        state
            .broker
            .connect_agency(&pending.user_id, &code, &state.config.public(GHL_CALLBACK))
            .await?;
        Ok(())
    }
    .await;
    callback_result(&state, PROVIDER_GHL, result)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAccountAuthorizeQuery {
    pub account_id: String,
}

pub async fn ghl_location_authorize(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SubAccountAuthorizeQuery>,
) -> ApiResult<AuthorizeUrl> {
    let account_id = query.account_id.trim();
    if account_id.is_empty() {
        return Err(ApiError::Validation("accountId is required".to_string()));
    }
    let oauth_state = state
        .broker
        .begin_authorization(&auth.user_id, PROVIDER_GHL_LOCATION, Some(account_id))
        .await?;
    let url = state
        .broker
        .ghl()
        .config()
        .consent_url(&state.config.public(GHL_LOCATION_CALLBACK), &oauth_state);
    Ok(Envelope::ok("Redirect to authorize", AuthorizeUrl { url }))
}

pub async fn ghl_location_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let result = async {
        let (pending, code) = verify_callback(&state, &query, PROVIDER_GHL_LOCATION).await?;
        let account_id = pending
            .account_id
            .ok_or_else(|| ApiError::Validation("Authorization has no sub-account".to_string()))?;
        state
            .broker
            .connect_location(
                &pending.user_id,
                &account_id,
                &code,
                &state.config.public(GHL_LOCATION_CALLBACK),
            )
            .await?;
        Ok(())
    }
    .await;
    callback_result(&state, PROVIDER_GHL_LOCATION, result)
}

#[derive(Debug, Serialize)]
pub struct LocationView {
    #[serde(flatten)]
    pub location: Location,
    pub installed: bool,
}

/// Locations of the connected agency, flagged when already imported.
pub async fn ghl_locations(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<LocationView>> {
    let agency = state.broker.agency_token(&auth.user_id).await?;
    let locations = state
        .broker
        .ghl()
        .search_locations(&agency.access_token, &agency.company_id)
        .await?;

    let installed: Vec<String> = sub_account::list_sub_accounts(state.db.pool(), &auth.user_id)
        .await?
        .into_iter()
        .filter(|s| s.connected)
        .map(|s| s.account_id)
        .collect();

    let views = locations
        .into_iter()
        .map(|location| LocationView {
            installed: installed.contains(&location.id),
            location,
        })
        .collect();
    Ok(Envelope::ok("OK", views))
}

// Sub-accounts

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub account_id: String,
}

pub async fn import_sub_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ImportRequest>,
) -> Result<(StatusCode, Envelope<Value>), ApiError> {
    let account_id = req.account_id.trim();
    if account_id.is_empty() {
        return Err(ApiError::Validation("accountId is required".to_string()));
    }
    state.broker.import_location(&auth.user_id, account_id).await?;
    Ok((StatusCode::CREATED, Envelope::done("Sub-account imported")))
}

pub async fn list_sub_accounts(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<SubAccount>> {
    let subs = sub_account::list_sub_accounts(state.db.pool(), &auth.user_id).await?;
    Ok(Envelope::ok("OK", subs))
}

pub async fn disconnect_sub_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(account_id): Path<String>,
) -> ApiResult<Value> {
    sub_account::disconnect_sub_account(state.db.pool(), &auth.user_id, &account_id).await?;
    info!(user_id = %auth.user_id, %account_id, "Sub-account disconnected");
    Ok(Envelope::done("Sub-account disconnected"))
}

// Saved contacts

fn clean_contact(mut fields: ContactFields) -> Result<ContactFields, ApiError> {
    fields.first_name = fields.first_name.trim().to_string();
    fields.last_name = fields.last_name.trim().to_string();
    if fields.first_name.is_empty() && fields.last_name.is_empty() {
        return Err(ApiError::Validation("A first or last name is required".to_string()));
    }
    fields.email = fields.email.filter(|e| !e.trim().is_empty());
    if let Some(email) = &fields.email {
        validate_email(email)?;
    }
    fields.phone = fields
        .phone
        .filter(|p| !p.trim().is_empty())
        .map(|p| normalize_phone(&p))
        .transpose()?;
    Ok(fields)
}

pub async fn list_contacts(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(account_id): Path<String>,
) -> ApiResult<Vec<SavedContact>> {
    sub_account::get_connected_sub_account(state.db.pool(), &auth.user_id, &account_id).await?;
    let contacts = contact::list_contacts(state.db.pool(), &auth.user_id, &account_id).await?;
    Ok(Envelope::ok("OK", contacts))
}

pub async fn create_contact(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(account_id): Path<String>,
    Json(fields): Json<ContactFields>,
) -> Result<(StatusCode, Envelope<SavedContact>), ApiError> {
    let fields = clean_contact(fields)?;
    let pool = state.db.pool();
    let id = contact::create_contact(pool, &auth.user_id, &account_id, &fields).await?;
    let saved = contact::get_contact(pool, &auth.user_id, &account_id, id).await?;
    Ok((StatusCode::CREATED, Envelope::ok("Contact saved", saved)))
}

pub async fn get_contact(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, id)): Path<(String, i64)>,
) -> ApiResult<SavedContact> {
    let saved = contact::get_contact(state.db.pool(), &auth.user_id, &account_id, id).await?;
    Ok(Envelope::ok("OK", saved))
}

pub async fn update_contact(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, id)): Path<(String, i64)>,
    Json(fields): Json<ContactFields>,
) -> ApiResult<SavedContact> {
    let fields = clean_contact(fields)?;
    let pool = state.db.pool();
    contact::update_contact(pool, &auth.user_id, &account_id, id, &fields).await?;
    let saved = contact::get_contact(pool, &auth.user_id, &account_id, id).await?;
    Ok(Envelope::ok("Contact updated", saved))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((account_id, id)): Path<(String, i64)>,
) -> ApiResult<Value> {
    contact::delete_contact(state.db.pool(), &auth.user_id, &account_id, id).await?;
    Ok(Envelope::done("Contact deleted"))
}

// Payments

pub async fn stripe_authorize(State(state): State<AppState>, auth: AuthUser) -> ApiResult<AuthorizeUrl> {
    let oauth_state = state
        .broker
        .begin_authorization(&auth.user_id, PROVIDER_STRIPE, None)
        .await?;
    let url = state
        .stripe
        .connect_authorize_url(&state.config.public(STRIPE_CALLBACK), &oauth_state)
        .ok_or_else(|| ApiError::Validation("Stripe Connect is not configured".to_string()))?;
    Ok(Envelope::ok("Redirect to authorize", AuthorizeUrl { url }))
}

pub async fn stripe_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let result = async {
        let (pending, code) = verify_callback(&state, &query, PROVIDER_STRIPE).await?;
        let token = state.stripe.exchange_connect_code(&code).await?;
        user::store_stripe_connection(
            state.db.pool(),
            &pending.user_id,
            &token.stripe_user_id,
            &token.access_token,
        )
        .await?;
        info!(user_id = %pending.user_id, account = %token.stripe_user_id, "Stripe account connected");
        Ok(())
    }
    .await;
    callback_result(&state, PROVIDER_STRIPE, result)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiKeyRequest {
    pub api_key: Option<String>,
}

/// Store the tenant's own model-provider key, or clear it with `null`.
pub async fn set_openai_key(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<OpenAiKeyRequest>,
) -> ApiResult<Value> {
    let key = req.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty());
    user::set_openai_key(state.db.pool(), &auth.user_id, key).await?;
    let message = if key.is_some() { "API key saved" } else { "API key removed" };
    Ok(Envelope::done(message))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletView {
    pub balance: f64,
    pub payments: Vec<Payment>,
    pub charges: Vec<BillingEvent>,
    /// Balance of the tenant's connected payments account, when one is
    /// connected and reachable.
    pub connected_balance: Option<Balance>,
}

pub async fn wallet(State(state): State<AppState>, auth: AuthUser) -> ApiResult<WalletView> {
    let pool = state.db.pool();
    let owner = user::get_user(pool, &auth.user_id).await?;

    let connected_balance = match owner.stripe_account_id.as_deref() {
        Some(account) => match state.stripe.retrieve_balance(Some(account)).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!(user_id = %auth.user_id, %account, error = %e, "Connected balance unavailable");
                None
            }
        },
        None => None,
    };

    let view = WalletView {
        balance: owner.wallet_balance,
        payments: billing::list_payments(pool, &auth.user_id, HISTORY_LIMIT).await?,
        charges: billing::list_billing_events(pool, &auth.user_id, HISTORY_LIMIT).await?,
        connected_balance,
    };
    Ok(Envelope::ok("OK", view))
}

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    /// Major currency units.
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Start a wallet top-up. The wallet is credited by the payment webhook.
pub async fn top_up(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<TopUpRequest>,
) -> ApiResult<Value> {
    if !req.amount.is_finite() || req.amount < MIN_TOP_UP {
        return Err(ApiError::Validation(format!(
            "Top-up amount must be at least {:.2}",
            MIN_TOP_UP
        )));
    }
    let currency = req
        .currency
        .as_deref()
        .unwrap_or("usd")
        .trim()
        .to_lowercase();
    let amount_minor = (req.amount * 100.0).round() as i64;

    let intent = state
        .stripe
        .create_payment_intent(amount_minor, &currency, &auth.user_id)
        .await?;
    info!(user_id = %auth.user_id, intent_id = %intent.id, amount_minor, "Top-up started");
    Ok(Envelope::ok(
        "Payment created",
        json!({
            "intentId": intent.id,
            "clientSecret": intent.client_secret,
            "amount": amount_minor,
            "currency": currency,
        }),
    ))
}
