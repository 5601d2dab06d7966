//! Route handlers for the dashboard API.

pub mod assistants;
pub mod auth;
pub mod health;
pub mod integrations;
pub mod numbers;
pub mod webhooks;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

/// Knowledge-base documents can be larger than the default body limit.
const UPLOAD_LIMIT_BYTES: usize = 20 * 1024 * 1024;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/integrations", integration_routes())
        .nest("/assistants", assistant_routes())
        .nest("/webhooks", webhook_routes())
        .route("/health", get(health::health))
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

fn integration_routes() -> Router<AppState> {
    use integrations::*;

    Router::new()
        // CRM OAuth
        .route("/ghl/authorize", get(ghl_authorize))
        .route("/ghl/callback", get(ghl_callback))
        .route("/ghl/sub-account/authorize", get(ghl_location_authorize))
        .route("/ghl/sub-account/callback", get(ghl_location_callback))
        .route("/ghl/locations", get(ghl_locations))
        // Sub-accounts
        .route("/sub-accounts", get(list_sub_accounts))
        .route("/sub-accounts/import", post(import_sub_account))
        .route("/sub-accounts/:account_id", delete(disconnect_sub_account))
        .route(
            "/sub-accounts/:account_id/contacts",
            get(list_contacts).post(create_contact),
        )
        .route(
            "/sub-accounts/:account_id/contacts/:id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
        // Payments
        .route("/stripe/authorize", get(stripe_authorize))
        .route("/stripe/callback", get(stripe_callback))
        .route("/openai-key", put(set_openai_key))
        .route("/wallet", get(wallet))
        .route("/wallet/top-up", post(top_up))
}

fn assistant_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:account_id",
            get(assistants::list_assistants).post(assistants::create_assistant),
        )
        .route("/:account_id/call-logs", get(assistants::call_logs))
        .route(
            "/:account_id/:assistant_id",
            get(assistants::get_assistant)
                .patch(assistants::update_assistant)
                .delete(assistants::delete_assistant),
        )
        .route("/:account_id/:assistant_id/tools", post(assistants::add_tool))
        .route(
            "/:account_id/:assistant_id/tools/:tool_id",
            delete(assistants::remove_tool),
        )
        .route(
            "/:account_id/:assistant_id/knowledge-base",
            post(assistants::upload_knowledge_base).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route(
            "/:account_id/:assistant_id/knowledge-base/:tool_id",
            delete(assistants::delete_knowledge_base),
        )
        .route(
            "/:account_id/:assistant_id/calls/:call_id",
            get(assistants::call_detail),
        )
        .route(
            "/:account_id/:assistant_id/team-notes",
            get(assistants::team_notes),
        )
        .route(
            "/:account_id/:assistant_id/numbers/available",
            get(numbers::available),
        )
        .route(
            "/:account_id/:assistant_id/numbers/purchase",
            post(numbers::purchase),
        )
        .route("/:account_id/:assistant_id/numbers/import", post(numbers::import))
        .route(
            "/:account_id/:assistant_id/numbers/:phone",
            delete(numbers::delete),
        )
}

fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/twilio/:account_id/:assistant_id",
            post(webhooks::twilio_voice),
        )
        .route(
            "/twilio/:account_id/:assistant_id/sms",
            post(webhooks::twilio_sms),
        )
        .route("/vapi/tools", post(webhooks::vapi_tools))
        .route("/vapi/billing", post(webhooks::vapi_billing))
        .route("/stripe", post(webhooks::stripe))
}
