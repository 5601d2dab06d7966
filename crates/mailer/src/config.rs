use secrecy::{ExposeSecret, SecretString};
use std::env;

use crate::MailerError;

/// SMTP relay settings.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub smtp_host: String,
    /// Submission port (default: 587, STARTTLS)
    pub smtp_port: u16,
    pub username: String,
    password: SecretString,
    /// Envelope and header sender. Defaults to `username`.
    pub from_address: String,
    /// Optional display name for the sender
    pub from_name: Option<String>,
}

impl MailerConfig {
    pub fn new(
        smtp_host: impl Into<String>,
        smtp_port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let username = username.into();
        Self {
            smtp_host: smtp_host.into(),
            smtp_port,
            from_address: username.clone(),
            username,
            password: SecretString::from(password.into()),
            from_name: None,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `SMTP_HOST`
    /// - `SMTP_USERNAME`
    /// - `SMTP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `SMTP_PORT` - Default: 587
    /// - `SMTP_FROM` - Default: `SMTP_USERNAME`
    /// - `SMTP_FROM_NAME`
    pub fn from_env() -> Result<Self, MailerError> {
        let required = |name: &'static str| env::var(name).map_err(|_| MailerError::MissingEnvVar(name));

        let smtp_host = required("SMTP_HOST")?;
        let smtp_port = match env::var("SMTP_PORT") {
            Ok(raw) => raw.trim().parse::<u16>().map_err(|_| MailerError::InvalidPort(raw))?,
            Err(_) => 587,
        };
        let username = required("SMTP_USERNAME")?;
        let password = required("SMTP_PASSWORD")?;

        let mut config = Self::new(smtp_host, smtp_port, username, password);
        if let Ok(from) = env::var("SMTP_FROM") {
            config.from_address = from;
        }
        config.from_name = env::var("SMTP_FROM_NAME").ok().filter(|s| !s.is_empty());
        Ok(config)
    }

    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Builder method to set the sender address.
    pub fn with_from(mut self, address: impl Into<String>, name: Option<String>) -> Self {
        self.from_address = address.into();
        self.from_name = name;
        self
    }

    /// `Name <address>` when a display name is set.
    pub(crate) fn from_header(&self) -> String {
        match &self.from_name {
            Some(name) => format!("{} <{}>", name, self.from_address),
            None => self.from_address.clone(),
        }
    }
}
