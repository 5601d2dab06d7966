use lettre::address::AddressError;
use thiserror::Error;

/// Errors from composing or relaying outbound mail.
#[derive(Debug, Error)]
pub enum MailerError {
    /// The SMTP relay could not be reached, refused the login, or refused
    /// the message.
    #[error("SMTP relay error: {0}")]
    Relay(#[from] lettre::transport::smtp::Error),

    #[error("Invalid {header} address '{value}': {source}")]
    Address {
        header: &'static str,
        value: String,
        #[source]
        source: AddressError,
    },

    #[error("Email has no recipients")]
    NoRecipients,

    #[error("Could not compose email: {0}")]
    Compose(#[from] lettre::error::Error),

    #[error("SMTP not configured: {0} is not set")]
    MissingEnvVar(&'static str),

    #[error("Invalid SMTP_PORT '{0}'")]
    InvalidPort(String),
}
