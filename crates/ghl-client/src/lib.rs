//! HighLevel (LeadConnector) REST client.
//!
//! Covers the slice of the CRM API the dashboard needs:
//!
//! - OAuth code exchange, refresh-token rotation and location tokens
//! - Sub-account (location) listing
//! - Contact lookup, upsert and update
//! - Calendar free slots, appointments and events
//! - Contact tasks
//!
//! # Example
//!
//! ```no_run
//! use ghl_client::{GhlClient, GhlConfig, UserType};
//!
//! # async fn example() -> Result<(), ghl_client::GhlError> {
//! let client = GhlClient::new(GhlConfig::from_env()?)?;
//! let tokens = client.refresh_token("stored-refresh-token", UserType::Location).await?;
//! // Persist tokens.refresh_token before doing anything else.
//! let slots = client
//!     .free_slots(&tokens.access_token, "cal-1", 1736467200000, 1736553600000, None)
//!     .await?;
//! println!("{} days with openings", slots.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::GhlClient;
pub use config::{GhlConfig, DEFAULT_SCOPES};
pub use error::GhlError;
pub use types::*;
