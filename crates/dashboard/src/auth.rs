//! Password hashing, access tokens, refresh sessions and the [`AuthUser`]
//! extractor.
//!
//! Access tokens are short-lived HS256 JWTs sent as bearer tokens. Refresh
//! tokens are opaque random strings carried in an httpOnly cookie; only
//! their SHA-256 hash is stored, and each use rotates them.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::Config;
use crate::error::ApiError;
use crate::state::AppState;

pub const REFRESH_COOKIE: &str = "refresh_token";
const ISSUER: &str = "agency-dashboard";

/// Hash a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| ApiError::Internal(format!("salt encoding: {}", e)))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing: {}", e)))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ApiError::Internal(format!("invalid password hash: {}", e)))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ApiError::Internal(format!("password verify: {}", e))),
    }
}

/// 32 random bytes, base64url without padding. Used for refresh tokens and
/// OAuth states.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 of a refresh token, the value stored in `sessions`.
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

pub fn issue_access_token(user_id: &str, config: &Config) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iss: ISSUER.to_string(),
        iat: now,
        exp: now + config.access_token_ttl.as_secs() as i64,
        jti: Uuid::new_v4().to_string(),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret()),
    )
    .map_err(|e| ApiError::Internal(format!("JWT encode: {}", e)))
}

pub fn decode_access_token(token: &str, config: &Config) -> Result<Claims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["sub", "exp", "iss"]);

    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(config.jwt_secret()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ApiError::Unauthorized("Access token expired".to_string()),
            _ => ApiError::Unauthorized("Invalid access token".to_string()),
        })
}

/// `Set-Cookie` value carrying a refresh token.
pub fn refresh_cookie(token: &str, config: &Config) -> Result<HeaderValue, ApiError> {
    cookie_header(token, config.refresh_token_ttl.as_secs(), config)
}

/// `Set-Cookie` value that removes the refresh cookie.
pub fn clear_refresh_cookie(config: &Config) -> Result<HeaderValue, ApiError> {
    cookie_header("", 0, config)
}

fn cookie_header(value: &str, max_age: u64, config: &Config) -> Result<HeaderValue, ApiError> {
    let secure = if config.secure_cookies() { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/auth; Max-Age={}{}",
        REFRESH_COOKIE, value, max_age, secure
    ))
    .map_err(|e| ApiError::Internal(format!("cookie header: {}", e)))
}

/// Value of a named cookie from the request headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// The authenticated user, from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = decode_access_token(token.trim(), &state.config)?;
        Ok(AuthUser { user_id: claims.sub })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
        assert!(verify_password("x", "not-a-hash").is_err());
    }

    #[test]
    fn test_access_token_verifies_with_same_secret_only() {
        let config = Config::new("secret-a");
        let token = issue_access_token("u1", &config).unwrap();
        assert_eq!(decode_access_token(&token, &config).unwrap().sub, "u1");

        let other = Config::new("secret-b");
        assert!(matches!(
            decode_access_token(&token, &other),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_random_tokens_differ_and_hash_is_stable() {
        let a = random_token();
        let b = random_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_eq!(hash_token("abc").len(), 64);
    }

    #[test]
    fn test_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; refresh_token=tok123"));
        assert_eq!(cookie_value(&headers, REFRESH_COOKIE).as_deref(), Some("tok123"));
        assert_eq!(cookie_value(&headers, "missing"), None);

        let cookie = refresh_cookie("tok", &Config::new("s")).unwrap();
        let text = cookie.to_str().unwrap();
        assert!(text.starts_with("refresh_token=tok; HttpOnly"));
        assert!(!text.contains("Secure"));
    }
}
