//! Error types for tool operations.

use thiserror::Error;

/// Errors that can occur during tool execution.
///
/// The `Display` text of every variant is what the assistant hears back in
/// the `error` field, so messages stay short and plain.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool not found in registry.
    #[error("Unknown tool: {0}")]
    NotFound(String),

    /// Missing required parameter.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// Invalid parameter value.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// CRM call failed.
    #[error("CRM error: {0}")]
    Crm(#[from] ghl_client::GhlError),

    #[error("Database error: {0}")]
    Database(#[from] database::DatabaseError),

    #[error("Email error: {0}")]
    Mail(#[from] mailer::MailerError),

    /// No CRM token could be obtained for the sub-account.
    #[error("CRM authorization failed: {0}")]
    Token(String),

    /// A service the tool depends on has no credentials configured.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Tool timed out after {0}s")]
    Timeout(u64),

    /// General execution error.
    #[error("{0}")]
    ExecutionFailed(String),
}

impl ToolError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ToolError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
