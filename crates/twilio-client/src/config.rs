//! Configuration for the telephony client.

use std::env;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::TwilioError;

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub base_url: String,
    pub account_sid: String,
    auth_token: SecretString,
    pub timeout: Duration,
}

impl TwilioConfig {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.twilio.com".to_string(),
            account_sid: account_sid.into(),
            auth_token: SecretString::from(auth_token.into()),
            timeout: Duration::from_secs(30),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required: `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`.
    pub fn from_env() -> Result<Self, TwilioError> {
        let sid = env::var("TWILIO_ACCOUNT_SID")
            .map_err(|_| TwilioError::Config("TWILIO_ACCOUNT_SID is required".to_string()))?;
        let token = env::var("TWILIO_AUTH_TOKEN")
            .map_err(|_| TwilioError::Config("TWILIO_AUTH_TOKEN is required".to_string()))?;
        Ok(Self::new(sid, token))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Auth token, needed when handing the account to the AI platform.
    pub fn auth_token(&self) -> &str {
        self.auth_token.expose_secret()
    }

    pub(crate) fn account_url(&self, path: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}{}",
            self.base_url, self.account_sid, path
        )
    }
}
