//! Request and response types for the CRM REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token audience requested from `/oauth/token`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    /// Agency-level token.
    Company,
    /// Sub-account (location) token.
    Location,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Company => "Company",
            UserType::Location => "Location",
        }
    }
}

/// Successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of `access_token` in seconds.
    #[serde(default)]
    pub expires_in: i64,
    /// Rotated refresh token. The previous one is invalid once this arrives.
    pub refresh_token: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default, rename = "userType")]
    pub user_type: Option<String>,
    #[serde(default, rename = "companyId")]
    pub company_id: Option<String>,
    #[serde(default, rename = "locationId")]
    pub location_id: Option<String>,
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
}

/// A CRM sub-account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LocationsEnvelope {
    #[serde(default)]
    pub locations: Vec<Location>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LocationEnvelope {
    pub location: Location,
}

/// A CRM contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
}

impl Contact {
    /// First and last name joined, skipping missing parts.
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContactEnvelope {
    #[serde(default)]
    pub contact: Option<Contact>,
}

/// Body for `POST /contacts/upsert`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertContact {
    pub location_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Body for `PUT /contacts/:id`. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ContactUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ContactUpdate::default()
    }
}

/// Open slots for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySlots {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// ISO-8601 slot start times.
    pub slots: Vec<String>,
}

/// Parse the free-slots body, which is keyed by date with a sibling
/// `traceId` field.
pub(crate) fn parse_free_slots(body: &Value) -> Vec<DaySlots> {
    let Some(map) = body.as_object() else {
        return Vec::new();
    };
    let mut days: Vec<DaySlots> = map
        .iter()
        .filter_map(|(date, value)| {
            let slots = value.get("slots")?.as_array()?;
            let slots: Vec<String> = slots
                .iter()
                .filter_map(|s| s.as_str().map(str::to_string))
                .collect();
            Some(DaySlots {
                date: date.clone(),
                slots,
            })
        })
        .filter(|day| !day.slots.is_empty())
        .collect();
    days.sort_by(|a, b| a.date.cmp(&b.date));
    days
}

/// Body for `POST /calendars/events/appointments`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub calendar_id: String,
    pub location_id: String,
    pub contact_id: String,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub appointment_status: String,
}

/// A calendar appointment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub calendar_id: Option<String>,
    #[serde(default)]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub appointment_status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventsEnvelope {
    #[serde(default)]
    pub events: Vec<Appointment>,
}

/// Body for `POST /contacts/:id/tasks`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// ISO-8601 due date.
    pub due_date: String,
    pub completed: bool,
}

/// A contact task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskEnvelope {
    pub task: Task,
}
