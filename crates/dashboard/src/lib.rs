//! Multi-tenant agency dashboard backend.
//!
//! Agencies connect their CRM, import sub-accounts, and run voice assistants
//! on an AI calling platform. The server brokers CRM OAuth tokens, answers
//! the telephony, AI-platform and payment webhooks, dispatches assistant
//! tool calls, and keeps a prepaid usage wallet per tenant.
//!
//! # Surfaces
//!
//! - `/auth`, `/integrations`, `/assistants`: JSON API for the frontend,
//!   answering `{status, message, data}` envelopes with matching HTTP codes.
//! - `/webhooks`: vendor callbacks, which always get a 200 body.
//! - `/health`: liveness and database reachability.

pub mod auth;
pub mod broker;
pub mod config;
pub mod envelope;
pub mod error;
pub mod greeting;
pub mod routes;
pub mod state;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use crate::config::Config;
pub use crate::state::{AppState, Vendors};

/// Build the application with tracing and CORS for the frontend origin.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.frontend_url);
    routes::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Credentialed CORS needs an explicit origin: the refresh cookie rides
/// along on `/auth/refresh`.
fn cors_layer(frontend_url: &str) -> CorsLayer {
    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        Err(e) => {
            warn!(%frontend_url, error = %e, "Invalid FRONTEND_URL, cross-origin requests disabled");
            CorsLayer::new()
        }
    }
}
