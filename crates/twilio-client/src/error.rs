//! Error types for the telephony client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TwilioError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response. `code` is Twilio's numeric error code when the
    /// body carried one.
    #[error("Twilio API returned {status}: {body}")]
    Api {
        status: u16,
        code: Option<i64>,
        body: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TwilioError {
    pub fn vendor_body(&self) -> Option<&str> {
        match self {
            TwilioError::Api { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Whether the resource was already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TwilioError::Api { status: 404, .. })
    }
}
