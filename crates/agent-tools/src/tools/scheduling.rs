//! Calendar tools: availability, booking and event listing.

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use database::validation::{normalize_phone, validate_email};
use ghl_client::{Appointment, NewAppointment, UpsertContact};
use serde_json::json;
use tracing::info;

use super::time::parse_time;
use crate::context::ToolContext;
use crate::error::ToolError;
use crate::tool::{ParamKind, ParamSpec, Tool, ToolArgs, ToolOutput};

pub(crate) const NO_SLOTS: &str = "No slots found.";

/// Lists open slots on the assistant's linked calendar.
///
/// `startTime` may be a bare date, in which case the whole day is searched.
pub struct CheckAvailability;

#[async_trait]
impl Tool for CheckAvailability {
    fn name(&self) -> &str {
        "check_availability"
    }

    fn description(&self) -> &str {
        "Check open appointment slots on the calendar for a date or time range."
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::required("startTime", ParamKind::String, "Date (YYYY-MM-DD) or ISO-8601 start"),
            ParamSpec::optional("endTime", ParamKind::String, "ISO-8601 end of the search range"),
            ParamSpec::optional("timezone", ParamKind::String, "IANA timezone for the returned slots"),
        ];
        PARAMS
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let ctx = &args.ctx;
        let calendar_id = ctx.calendar_id()?;

        let start = parse_time("startTime", &args.get_string("startTime")?, args.ctx.zone())?;
        let end_ms = match args.get_string_opt("endTime") {
            Some(raw) => parse_time("endTime", &raw, args.ctx.zone())?.end_of_range_ms(),
            None => start.end_of_range_ms(),
        };
        if end_ms <= start.start_ms() {
            return Err(ToolError::invalid("endTime", "must be after startTime"));
        }

        let timezone = args
            .get_string_opt("timezone")
            .or_else(|| ctx.scope.timezone.clone());

        let token = ctx.crm_token().await?;
        let days = ctx
            .services
            .ghl
            .free_slots(token, calendar_id, start.start_ms(), end_ms, timezone.as_deref())
            .await?;

        let slots: Vec<String> = days.into_iter().flat_map(|day| day.slots).collect();
        if slots.is_empty() {
            return Ok(ToolOutput::success(NO_SLOTS));
        }
        Ok(ToolOutput::success(serde_json::to_string(&slots)?))
    }
}

/// Details for one booking. Built by either booking tool.
pub(crate) struct BookingRequest {
    pub start: DateTime<FixedOffset>,
    pub end: Option<DateTime<FixedOffset>>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
}

/// Upsert the contact, then book the slot against it.
pub(crate) async fn ensure_contact_and_book(
    ctx: &ToolContext,
    request: BookingRequest,
) -> Result<Appointment, ToolError> {
    let calendar_id = ctx.calendar_id()?;

    if let Some(email) = &request.email {
        validate_email(email).map_err(|e| ToolError::invalid("email", e.to_string()))?;
    }
    let phone = request
        .phone
        .as_deref()
        .map(normalize_phone)
        .transpose()
        .map_err(|e| ToolError::invalid("phone", e.to_string()))?;

    let token = ctx.crm_token().await?;
    let ghl = &ctx.services.ghl;

    let contact = ghl
        .upsert_contact(
            token,
            &UpsertContact {
                location_id: ctx.scope.account_id.clone(),
                first_name: request.first_name,
                last_name: request.last_name,
                email: request.email,
                phone,
                source: Some("AI assistant".to_string()),
            },
        )
        .await?;

    let appointment = ghl
        .create_appointment(
            token,
            &NewAppointment {
                calendar_id: calendar_id.to_string(),
                location_id: ctx.scope.account_id.clone(),
                contact_id: contact.id.clone(),
                start_time: request.start.to_rfc3339(),
                end_time: request.end.map(|e| e.to_rfc3339()),
                title: request.title,
                notes: request.notes,
                appointment_status: "confirmed".to_string(),
            },
        )
        .await?;

    info!(
        assistant_id = %ctx.scope.assistant_id,
        contact_id = %contact.id,
        appointment_id = %appointment.id,
        "Booked appointment"
    );
    Ok(appointment)
}

fn optional_end(args: &ToolArgs, start: DateTime<FixedOffset>) -> Result<Option<DateTime<FixedOffset>>, ToolError> {
    let Some(raw) = args.get_string_opt("endTime") else {
        return Ok(None);
    };
    let end = parse_time("endTime", &raw, args.ctx.zone())?.instant("endTime")?;
    if end <= start {
        return Err(ToolError::invalid("endTime", "must be after startTime"));
    }
    Ok(Some(end))
}

fn booked_message(appointment: &Appointment, start: DateTime<FixedOffset>) -> String {
    format!(
        "Appointment booked for {} (confirmation {}).",
        start.to_rfc3339(),
        appointment.id
    )
}

/// Books an appointment for a contact identified by phone or email.
pub struct BookAppointment;

#[async_trait]
impl Tool for BookAppointment {
    fn name(&self) -> &str {
        "book_appointment"
    }

    fn description(&self) -> &str {
        "Book an appointment on the calendar for the caller or a named contact."
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::required("startTime", ParamKind::String, "ISO-8601 start of the appointment"),
            ParamSpec::optional("endTime", ParamKind::String, "ISO-8601 end of the appointment"),
            ParamSpec::optional("phone", ParamKind::String, "Contact phone number"),
            ParamSpec::optional("email", ParamKind::String, "Contact email address"),
            ParamSpec::optional("firstName", ParamKind::String, "Contact first name"),
            ParamSpec::optional("lastName", ParamKind::String, "Contact last name"),
            ParamSpec::optional("title", ParamKind::String, "Appointment title"),
        ];
        PARAMS
    }

    fn required_any(&self) -> &'static [&'static [&'static str]] {
        &[&["phone", "email"]]
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let start = parse_time("startTime", &args.get_string("startTime")?, args.ctx.zone())?.instant("startTime")?;
        let request = BookingRequest {
            start,
            end: optional_end(&args, start)?,
            first_name: args.get_string_opt("firstName"),
            last_name: args.get_string_opt("lastName"),
            email: args.get_string_opt("email"),
            phone: args.get_string_opt("phone"),
            title: args.get_string_opt("title"),
            notes: None,
        };
        let appointment = ensure_contact_and_book(&args.ctx, request).await?;
        Ok(ToolOutput::success(booked_message(&appointment, start)))
    }
}

/// Lets a caller book themselves in with a single full name.
pub struct SelfSchedule;

#[async_trait]
impl Tool for SelfSchedule {
    fn name(&self) -> &str {
        "self_schedule"
    }

    fn description(&self) -> &str {
        "Schedule the caller into an open slot using their name and contact details."
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::required("startTime", ParamKind::String, "ISO-8601 start of the slot"),
            ParamSpec::optional("email", ParamKind::String, "Caller email address"),
            ParamSpec::optional("phone", ParamKind::String, "Caller phone number"),
            ParamSpec::optional("name", ParamKind::String, "Caller full name"),
            ParamSpec::optional("notes", ParamKind::String, "Reason for the visit"),
        ];
        PARAMS
    }

    fn required_any(&self) -> &'static [&'static [&'static str]] {
        &[&["email", "phone"]]
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let start = parse_time("startTime", &args.get_string("startTime")?, args.ctx.zone())?.instant("startTime")?;
        let (first_name, last_name) = split_name(args.get_string_opt("name"));
        let request = BookingRequest {
            start,
            end: None,
            first_name,
            last_name,
            email: args.get_string_opt("email"),
            phone: args.get_string_opt("phone"),
            title: Some("Self-scheduled appointment".to_string()),
            notes: args.get_string_opt("notes"),
        };
        let appointment = ensure_contact_and_book(&args.ctx, request).await?;
        Ok(ToolOutput::success(booked_message(&appointment, start)))
    }
}

fn split_name(name: Option<String>) -> (Option<String>, Option<String>) {
    let Some(name) = name else {
        return (None, None);
    };
    match name.split_once(char::is_whitespace) {
        Some((first, last)) => (Some(first.to_string()), Some(last.trim().to_string())),
        None => (Some(name), None),
    }
}

/// Lists booked events on the linked calendar. Defaults to the next 7 days.
pub struct ListEvents;

#[async_trait]
impl Tool for ListEvents {
    fn name(&self) -> &str {
        "list_events"
    }

    fn description(&self) -> &str {
        "List booked events on the calendar."
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::optional("startTime", ParamKind::String, "Date or ISO-8601 start"),
            ParamSpec::optional("endTime", ParamKind::String, "Date or ISO-8601 end"),
        ];
        PARAMS
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let ctx = &args.ctx;
        let calendar_id = ctx.calendar_id()?;

        let start_ms = match args.get_string_opt("startTime") {
            Some(raw) => parse_time("startTime", &raw, args.ctx.zone())?.start_ms(),
            None => Utc::now().timestamp_millis(),
        };
        let end_ms = match args.get_string_opt("endTime") {
            Some(raw) => parse_time("endTime", &raw, args.ctx.zone())?.end_of_range_ms(),
            None => start_ms + Duration::days(7).num_milliseconds(),
        };

        let token = ctx.crm_token().await?;
        let events = ctx
            .services
            .ghl
            .list_events(token, &ctx.scope.account_id, calendar_id, start_ms, end_ms)
            .await?;

        if events.is_empty() {
            return Ok(ToolOutput::success("No events found."));
        }
        let summary: Vec<_> = events
            .iter()
            .map(|e| {
                json!({
                    "title": e.title,
                    "startTime": e.start_time,
                    "endTime": e.end_time,
                    "status": e.appointment_status,
                })
            })
            .collect();
        Ok(ToolOutput::success(serde_json::to_string(&summary)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(
            split_name(Some("Ada Lovelace King".to_string())),
            (Some("Ada".to_string()), Some("Lovelace King".to_string()))
        );
        assert_eq!(split_name(Some("Ada".to_string())), (Some("Ada".to_string()), None));
        assert_eq!(split_name(None), (None, None));
    }
}
