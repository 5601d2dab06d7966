//! Error types for the AI-platform client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VapiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response; `body` is the raw vendor body.
    #[error("Vapi API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// A bypass call was created but no TwiML came back.
    #[error("call {0} returned no TwiML")]
    MissingTwiml(String),

    /// The call has no live control URL (already ended or never started).
    #[error("call {0} has no control URL")]
    NoControlUrl(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl VapiError {
    pub fn vendor_body(&self) -> Option<&str> {
        match self {
            VapiError::Api { body, .. } => Some(body),
            _ => None,
        }
    }

    /// The resource no longer exists on the platform.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VapiError::Api { status: 404, .. })
    }
}
