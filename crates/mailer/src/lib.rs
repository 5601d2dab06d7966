//! # mailer
//!
//! Outbound email through an authenticated SMTP relay.
//!
//! ```no_run
//! use mailer::{Email, MailSender, MailerConfig, SmtpMailer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mailer::MailerError> {
//!     let mailer = SmtpMailer::new(MailerConfig::from_env()?)?;
//!     mailer.send(&Email::new("lead@example.com", "Booked", "See you Friday.")).await?;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod types;

pub use client::{MailSender, SmtpMailer};
pub use config::MailerConfig;
pub use error::MailerError;
pub use types::Email;
