//! Twilio REST client.
//!
//! Number search, purchase, webhook configuration and release; call
//! lookups; webhook signature checks; and the handful of TwiML replies
//! the dashboard sends.

pub mod client;
pub mod config;
pub mod error;
pub mod signature;
pub mod twiml;
pub mod types;

pub use client::TwilioClient;
pub use config::TwilioConfig;
pub use error::TwilioError;
pub use signature::{sign_request, verify_request, SIGNATURE_HEADER};
pub use types::{AvailableNumber, CallRecord, IncomingNumber, NumberWebhooks};
