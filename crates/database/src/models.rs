//! Database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tenant of the dashboard (an agency login).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// UUID assigned at signup.
    pub id: String,
    /// Login email, unique.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Usage credit, decremented by billing webhooks.
    pub wallet_balance: f64,
    /// Connected payments account id.
    pub stripe_account_id: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_access_token: Option<String>,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    /// CRM agency id pinned on first connection.
    pub ghl_company_id: Option<String>,
    #[serde(skip_serializing)]
    pub ghl_refresh_token: Option<String>,
    pub ghl_token_expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Whether the agency-level CRM integration has a usable refresh token.
    pub fn ghl_connected(&self) -> bool {
        self.ghl_refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

/// A CRM location imported by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SubAccount {
    pub user_id: String,
    /// CRM-assigned location id.
    pub account_id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<String>,
    pub connected: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Local cross-references for an AI-platform assistant.
///
/// The prompt, model and voice live on the AI platform; only the ids needed
/// to authorize and locate the assistant are stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Assistant {
    pub assistant_id: String,
    pub user_id: String,
    pub account_id: String,
    pub name: String,
    /// Linked CRM calendar.
    pub calendar_id: Option<String>,
    /// Greeting template rendered per inbound call.
    pub dynamic_greeting: Option<String>,
    pub timezone: Option<String>,
    /// Optimistic lock counter.
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Mutable linkage fields of an assistant. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssistantChanges {
    pub name: Option<String>,
    pub calendar_id: Option<String>,
    pub dynamic_greeting: Option<String>,
    pub timezone: Option<String>,
}

/// A knowledge-base query tool linked to an assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct KnowledgeBaseTool {
    pub assistant_id: String,
    pub tool_id: String,
    pub file_id: Option<String>,
    pub name: String,
    pub created_at: String,
}

/// A function tool connected to an assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConnectedTool {
    pub assistant_id: String,
    pub tool_id: String,
    pub tool_name: String,
    pub created_at: String,
}

/// A free-text note appended by the assistant during a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TeamNote {
    pub id: i64,
    pub assistant_id: String,
    pub note: String,
    pub call_id: Option<String>,
    pub created_at: String,
}

/// A phone number attached to an assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct NumberDetail {
    /// E.164 number.
    pub phone_num: String,
    pub assistant_id: String,
    /// AI-platform phone number id.
    pub vapi_phone_num_id: String,
    /// Telephony-provider incoming number SID.
    pub phone_sid: String,
    pub created_at: String,
}

/// A billed lifecycle stage of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BillingEvent {
    pub id: i64,
    pub user_id: String,
    pub call_id: String,
    pub event_type: String,
    /// Cost the AI platform reported with this event.
    pub reported_cost: f64,
    /// Amount actually deducted from the wallet.
    pub amount: f64,
    pub created_at: String,
}

/// A wallet top-up reported by the payments webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: String,
    pub intent_id: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub created_at: String,
}

/// A pending OAuth authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct OAuthState {
    pub state: String,
    pub user_id: String,
    pub provider: String,
    /// Target sub-account for location-scoped flows.
    pub account_id: Option<String>,
    pub created_at: String,
}

/// A refresh-token session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub token_hash: String,
    pub user_id: String,
    pub expires_at: String,
    pub created_at: String,
}

/// A contact kept locally for a sub-account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SavedContact {
    pub id: i64,
    pub user_id: String,
    pub account_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Writable fields of a saved contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFields {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub notes: Option<String>,
}
