//! Signup, login and refresh-session rotation.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::models::{NewUser, User};
use database::validation::{validate_email, validate_password};
use database::{session, user, DatabaseError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::{
    clear_refresh_cookie, cookie_value, hash_password, hash_token, issue_access_token,
    random_token, refresh_cookie, verify_password, AuthUser, REFRESH_COOKIE,
};
use crate::envelope::Envelope;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const INVALID_LOGIN: &str = "Invalid email or password";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: User,
}

/// Create an account and sign it in.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let email = req.email.trim().to_lowercase();
    validate_email(&email)?;
    validate_password(&req.password)?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Name is required".to_string()));
    }

    let id = Uuid::new_v4().to_string();
    let new_user = NewUser {
        id: id.clone(),
        email,
        name: name.to_string(),
        password_hash: hash_password(&req.password)?,
    };
    user::create_user(state.db.pool(), &new_user)
        .await
        .map_err(|e| match e {
            DatabaseError::AlreadyExists { .. } => {
                ApiError::Conflict("Email already registered".to_string())
            }
            other => other.into(),
        })?;

    info!(user_id = %id, "User registered");
    start_session(&state, &id, StatusCode::CREATED, "Account created").await
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let pool = state.db.pool();
    let account = match user::get_user_by_email(pool, &req.email.trim().to_lowercase()).await {
        Ok(account) => account,
        Err(e) if e.is_not_found() => return Err(ApiError::Unauthorized(INVALID_LOGIN.to_string())),
        Err(e) => return Err(e.into()),
    };
    if !verify_password(&req.password, &account.password_hash)? {
        return Err(ApiError::Unauthorized(INVALID_LOGIN.to_string()));
    }

    match session::prune_expired(pool).await {
        Ok(pruned) if pruned > 0 => debug!(pruned, "Pruned expired sessions"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to prune sessions"),
    }

    info!(user_id = %account.id, "User logged in");
    start_session(&state, &account.id, StatusCode::OK, "Logged in").await
}

/// Rotate the refresh cookie and mint a new access token.
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let token = cookie_value(&headers, REFRESH_COOKIE)
        .ok_or_else(|| ApiError::Unauthorized("Missing refresh token".to_string()))?;
    let session = session::consume_session(state.db.pool(), &hash_token(&token))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Session expired; log in again".to_string()))?;

    start_session(&state, &session.user_id, StatusCode::OK, "Session refreshed").await
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    if let Some(token) = cookie_value(&headers, REFRESH_COOKIE) {
        session::delete_session(state.db.pool(), &hash_token(&token)).await?;
    }
    let cookie = clear_refresh_cookie(&state.config)?;
    Ok(([(SET_COOKIE, cookie)], Envelope::done("Logged out")).into_response())
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<User> {
    let account = user::get_user(state.db.pool(), &auth.user_id).await?;
    Ok(Envelope::ok("OK", account))
}

async fn start_session(
    state: &AppState,
    user_id: &str,
    status: StatusCode,
    message: &str,
) -> Result<Response, ApiError> {
    let pool = state.db.pool();
    let account = user::get_user(pool, user_id).await?;

    let refresh = random_token();
    session::create_session(
        pool,
        &hash_token(&refresh),
        user_id,
        state.config.refresh_token_ttl.as_secs(),
    )
    .await?;

    let data = SessionData {
        access_token: issue_access_token(user_id, &state.config)?,
        token_type: "Bearer",
        expires_in: state.config.access_token_ttl.as_secs(),
        user: account,
    };
    let cookie = refresh_cookie(&refresh, &state.config)?;
    Ok((status, [(SET_COOKIE, cookie)], Envelope::ok(message, data)).into_response())
}
