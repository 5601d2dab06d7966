//! Error types for the CRM client.

use thiserror::Error;

/// Errors returned by [`GhlClient`](crate::GhlClient).
#[derive(Debug, Error)]
pub enum GhlError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The token endpoint refused the grant (expired, revoked or rotated
    /// refresh token, bad code). The integration must be reconnected.
    #[error("token rejected ({status}): {message}")]
    TokenRejected { status: u16, message: String },

    /// Any other non-success response. `body` is the raw vendor body.
    #[error("CRM API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GhlError {
    /// Raw vendor response body, when there is one.
    pub fn vendor_body(&self) -> Option<&str> {
        match self {
            GhlError::Api { body, .. } => Some(body),
            GhlError::TokenRejected { message, .. } => Some(message),
            _ => None,
        }
    }
}
