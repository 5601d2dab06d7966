//! Error types for the payments client.

use thiserror::Error;

/// Why a webhook signature was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing Stripe-Signature header")]
    MissingHeader,
    #[error("malformed Stripe-Signature header")]
    Malformed,
    #[error("no signature matched the payload")]
    NoMatch,
    #[error("signature timestamp outside tolerance")]
    Expired,
}

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    /// Non-success response; `body` is the raw vendor body.
    #[error("Stripe API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StripeError {
    pub fn vendor_body(&self) -> Option<&str> {
        match self {
            StripeError::Api { body, .. } => Some(body),
            _ => None,
        }
    }
}
