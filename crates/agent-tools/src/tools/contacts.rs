//! CRM contact tools: field updates and follow-up tasks.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use database::validation::{normalize_phone, validate_email};
use ghl_client::{ContactUpdate, NewTask};
use tracing::info;

use super::time::{parse_time, TimeArg};
use crate::context::ToolContext;
use crate::error::ToolError;
use crate::tool::{ParamKind, ParamSpec, Tool, ToolArgs, ToolOutput};

fn phone_arg(raw: &str) -> Result<String, ToolError> {
    normalize_phone(raw).map_err(|e| ToolError::invalid("phone", e.to_string()))
}

/// Resolve a contact id directly or through a phone lookup.
async fn resolve_contact(
    ctx: &ToolContext,
    contact_id: Option<String>,
    phone: Option<&str>,
) -> Result<Option<String>, ToolError> {
    if let Some(id) = contact_id {
        return Ok(Some(id));
    }
    let Some(phone) = phone else {
        return Ok(None);
    };
    let token = ctx.crm_token().await?;
    let contact = ctx
        .services
        .ghl
        .find_contact_by_phone(token, &ctx.scope.account_id, phone)
        .await?;
    Ok(contact.map(|c| c.id))
}

/// Updates fields on an existing CRM contact.
///
/// Without `contactId`, `phone` identifies the contact and is not itself
/// updated.
pub struct UpdateContact;

#[async_trait]
impl Tool for UpdateContact {
    fn name(&self) -> &str {
        "update_contact"
    }

    fn description(&self) -> &str {
        "Update a contact's details in the CRM."
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::optional("contactId", ParamKind::String, "CRM contact id"),
            ParamSpec::optional("phone", ParamKind::String, "Phone number"),
            ParamSpec::optional("firstName", ParamKind::String, "First name"),
            ParamSpec::optional("lastName", ParamKind::String, "Last name"),
            ParamSpec::optional("email", ParamKind::String, "Email address"),
            ParamSpec::optional("companyName", ParamKind::String, "Company name"),
            ParamSpec::optional("address1", ParamKind::String, "Street address"),
            ParamSpec::optional("city", ParamKind::String, "City"),
            ParamSpec::optional("tags", ParamKind::StringList, "Tags to set"),
        ];
        PARAMS
    }

    fn required_any(&self) -> &'static [&'static [&'static str]] {
        &[&["contactId", "phone"]]
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let contact_id = args.get_string_opt("contactId");
        let phone = args.get_string_opt("phone").map(|p| phone_arg(&p)).transpose()?;

        let email = args.get_string_opt("email");
        if let Some(email) = &email {
            validate_email(email).map_err(|e| ToolError::invalid("email", e.to_string()))?;
        }

        let update = ContactUpdate {
            first_name: args.get_string_opt("firstName"),
            last_name: args.get_string_opt("lastName"),
            email,
            phone: if contact_id.is_some() { phone.clone() } else { None },
            company_name: args.get_string_opt("companyName"),
            address1: args.get_string_opt("address1"),
            city: args.get_string_opt("city"),
            tags: args.get_string_list_opt("tags"),
        };
        if update.is_empty() {
            return Err(ToolError::invalid("contact", "no fields to update"));
        }

        let lookup_phone = if contact_id.is_some() { None } else { phone.as_deref() };
        let Some(id) = resolve_contact(&args.ctx, contact_id.clone(), lookup_phone).await? else {
            return Ok(ToolOutput::failure(format!(
                "No contact found with phone {}.",
                phone.unwrap_or_default()
            )));
        };

        let token = args.ctx.crm_token().await?;
        let contact = args.ctx.services.ghl.update_contact(token, &id, &update).await?;
        info!(contact_id = %contact.id, "Updated contact");
        Ok(ToolOutput::success(format!("Contact {} updated.", contact.id)))
    }
}

/// Creates a follow-up task on a contact. Falls back to the caller's
/// number when neither `contactId` nor `phone` is given.
pub struct CreateTask;

#[async_trait]
impl Tool for CreateTask {
    fn name(&self) -> &str {
        "create_task"
    }

    fn description(&self) -> &str {
        "Create a follow-up task for the team on a contact."
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::required("title", ParamKind::String, "Task title"),
            ParamSpec::optional("body", ParamKind::String, "Task details"),
            ParamSpec::optional("dueDate", ParamKind::String, "Date or ISO-8601 due time"),
            ParamSpec::optional("contactId", ParamKind::String, "CRM contact id"),
            ParamSpec::optional("phone", ParamKind::String, "Contact phone number"),
        ];
        PARAMS
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let title = args.get_string("title")?;

        let due = match args.get_string_opt("dueDate") {
            Some(raw) => match parse_time("dueDate", &raw, args.ctx.zone())? {
                TimeArg::Instant(dt) => dt.to_rfc3339(),
                // A bare date is due by the end of that local day.
                TimeArg::Day { next, .. } => (next - Duration::seconds(1)).to_rfc3339(),
            },
            None => (Utc::now() + Duration::days(1)).to_rfc3339(),
        };

        let phone = match args.get_string_opt("phone") {
            Some(p) => Some(phone_arg(&p)?),
            None => args.ctx.scope.customer_number.clone(),
        };
        let Some(contact_id) =
            resolve_contact(&args.ctx, args.get_string_opt("contactId"), phone.as_deref()).await?
        else {
            return Ok(ToolOutput::failure("No contact found to attach the task to."));
        };

        let token = args.ctx.crm_token().await?;
        let task = args
            .ctx
            .services
            .ghl
            .create_task(
                token,
                &contact_id,
                &NewTask {
                    title: title.clone(),
                    body: args.get_string_opt("body"),
                    due_date: due,
                    completed: false,
                },
            )
            .await?;
        info!(task_id = %task.id, %contact_id, "Created task");
        Ok(ToolOutput::success(format!("Task \"{}\" created.", title)))
    }
}
