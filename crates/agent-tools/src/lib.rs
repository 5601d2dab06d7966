//! Tool registry and implementations for assistant tool calls.
//!
//! The AI platform posts a batch of named tool calls per webhook delivery.
//! [`ToolRegistry::dispatch`] validates each call's arguments against the
//! tool's declared [`ParamSpec`]s, runs it with a shared [`ToolContext`]
//! and answers with one `result` or `error` entry per call id, in order.
//!
//! # Built-in Tools
//!
//! ## Calendar
//! - [`CheckAvailability`] - Open slots on the assistant's calendar.
//! - [`BookAppointment`] / [`SelfSchedule`] - Upsert the contact and book a slot.
//! - [`ListEvents`] - Booked events on the calendar.
//!
//! ## CRM
//! - [`UpdateContact`] - Update contact fields.
//! - [`CreateTask`] - Follow-up task on a contact.
//!
//! ## Utility
//! - [`WebSearch`] - Web search digest.
//! - [`ScrapeWebsite`] - Page text, with SSRF checks.
//! - [`SendEmail`] - Outbound email via SMTP.
//! - [`AddTeamNote`] - Append a note for the human team.

mod config;
mod context;
mod error;
mod registry;
mod tool;
pub mod tools;

pub use config::ToolsConfig;
pub use context::{CallScope, TokenSource, ToolContext, ToolServices};
pub use error::ToolError;
pub use registry::{reject_all, ToolRegistry, MALFORMED_CALL};
pub use tool::{parameters_schema, ParamKind, ParamSpec, Tool, ToolArgs, ToolOutput};
pub use tools::{
    AddTeamNote, BookAppointment, CheckAvailability, CreateTask, ListEvents, ScrapeWebsite,
    SelfSchedule, SendEmail, UpdateContact, WebSearch,
};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

/// Create a new registry with all built-in tools registered.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    // Calendar
    registry.register(CheckAvailability);
    registry.register(BookAppointment);
    registry.register(SelfSchedule);
    registry.register(ListEvents);

    // CRM
    registry.register(UpdateContact);
    registry.register(CreateTask);
    registry.register(AddTeamNote);

    // Utility
    registry.register(WebSearch);
    registry.register(ScrapeWebsite);
    registry.register(SendEmail);

    registry
}
