//! Vapi REST client.
//!
//! Assistant, tool, file, phone-number and call endpoints, plus the
//! server-message payloads the platform posts to webhook URLs
//! ([`webhook`]).

pub mod client;
pub mod config;
pub mod error;
pub mod types;
pub mod webhook;

pub use client::VapiClient;
pub use config::VapiConfig;
pub use error::VapiError;
pub use types::*;
pub use webhook::{
    verify_server_secret, FunctionCall, ServerEnvelope, ServerMessage, ToolCall, ToolCallResult,
    ToolResults, SECRET_HEADER,
};
