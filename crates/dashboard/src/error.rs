//! Error types for the dashboard API.
//!
//! Every failure renders as an [`Envelope`] with `status: false` and an HTTP
//! status chosen by kind: vendor 502, not found 404, validation 400,
//! auth 401, conflict 409, anything else 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;

use crate::broker::BrokerError;
use crate::envelope::Envelope;

#[derive(Debug, Error)]
pub enum ApiError {
    /// A vendor API refused or failed. `body` is the vendor's response.
    #[error("{service} request failed: {message}")]
    Vendor {
        service: &'static str,
        message: String,
        body: Option<Value>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn vendor(service: &'static str, message: impl ToString, body: Option<&str>) -> Self {
        ApiError::Vendor {
            service,
            message: message.to_string(),
            body: body.map(|raw| {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
            }),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Vendor { .. } => StatusCode::BAD_GATEWAY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let envelope = match self {
            ApiError::Vendor {
                service,
                message,
                body,
            } => {
                tracing::warn!(service, %message, "Vendor request failed");
                Envelope::fail(format!("{} request failed: {}", service, message), body)
            }
            ApiError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                Envelope::fail("Internal server error", None)
            }
            other => Envelope::fail(other.to_string(), None),
        };
        (status, envelope).into_response()
    }
}

impl From<database::DatabaseError> for ApiError {
    fn from(err: database::DatabaseError) -> Self {
        use database::DatabaseError;
        match err {
            DatabaseError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} not found: {}", entity, id))
            }
            DatabaseError::AlreadyExists { entity, id } => {
                ApiError::Conflict(format!("{} already exists: {}", entity, id))
            }
            DatabaseError::Conflict { entity, id } => ApiError::Conflict(format!(
                "{} {} was changed by another request; reload and retry",
                entity, id
            )),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<database::ValidationError> for ApiError {
    fn from(err: database::ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<ghl_client::GhlError> for ApiError {
    fn from(err: ghl_client::GhlError) -> Self {
        let body = err.vendor_body().map(str::to_string);
        ApiError::vendor("CRM", err, body.as_deref())
    }
}

impl From<vapi_client::VapiError> for ApiError {
    fn from(err: vapi_client::VapiError) -> Self {
        let body = err.vendor_body().map(str::to_string);
        ApiError::vendor("Vapi", err, body.as_deref())
    }
}

impl From<twilio_client::TwilioError> for ApiError {
    fn from(err: twilio_client::TwilioError) -> Self {
        let body = err.vendor_body().map(str::to_string);
        ApiError::vendor("Twilio", err, body.as_deref())
    }
}

impl From<stripe_client::StripeError> for ApiError {
    fn from(err: stripe_client::StripeError) -> Self {
        let body = err.vendor_body().map(str::to_string);
        ApiError::vendor("Stripe", err, body.as_deref())
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::NotConnected(_) | BrokerError::LocationMismatch { .. } => {
                ApiError::Validation(err.to_string())
            }
            BrokerError::InvalidState => ApiError::Unauthorized(err.to_string()),
            BrokerError::CrossTenant | BrokerError::AlreadyInstalled => {
                ApiError::Conflict(err.to_string())
            }
            BrokerError::Rejected { .. } => ApiError::vendor("CRM", err, None),
            BrokerError::Crm(e) => e.into(),
            BrokerError::Database(e) => e.into(),
        }
    }
}

/// Result type for frontend handlers.
pub type ApiResult<T> = std::result::Result<Envelope<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_map_to_statuses() {
        let not_found: ApiError = database::DatabaseError::NotFound {
            entity: "Assistant",
            id: "a1".to_string(),
        }
        .into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let conflict: ApiError = database::DatabaseError::Conflict {
            entity: "Assistant",
            id: "a1".to_string(),
        }
        .into();
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_vendor_body_is_parsed_when_json() {
        let err = ApiError::vendor("Twilio", "boom", Some(r#"{"code":21452}"#));
        match err {
            ApiError::Vendor { body, .. } => assert_eq!(body, Some(serde_json::json!({"code": 21452}))),
            _ => panic!("expected vendor error"),
        }
        let raw = ApiError::vendor("Twilio", "boom", Some("gateway down"));
        assert_eq!(raw.status_code(), StatusCode::BAD_GATEWAY);
    }
}
