//! Configuration for the payments client.

use std::env;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::StripeError;

/// Maximum age of a signed webhook, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub base_url: String,
    /// Host of the Connect OAuth endpoints.
    pub connect_url: String,
    secret_key: SecretString,
    webhook_secret: SecretString,
    /// Connect platform client id (`ca_...`), if Connect onboarding is used.
    pub client_id: Option<String>,
    pub tolerance_secs: i64,
    pub timeout: Duration,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.stripe.com".to_string(),
            connect_url: "https://connect.stripe.com".to_string(),
            secret_key: SecretString::from(secret_key.into()),
            webhook_secret: SecretString::from(webhook_secret.into()),
            client_id: None,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
            timeout: Duration::from_secs(30),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `STRIPE_SECRET_KEY`
    /// - `STRIPE_WEBHOOK_SECRET`
    ///
    /// Optional:
    /// - `STRIPE_CLIENT_ID` - Connect client id
    pub fn from_env() -> Result<Self, StripeError> {
        let secret_key = env::var("STRIPE_SECRET_KEY")
            .map_err(|_| StripeError::Config("STRIPE_SECRET_KEY is required".to_string()))?;
        let webhook_secret = env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| StripeError::Config("STRIPE_WEBHOOK_SECRET is required".to_string()))?;
        let mut config = Self::new(secret_key, webhook_secret);
        config.client_id = env::var("STRIPE_CLIENT_ID").ok().filter(|s| !s.is_empty());
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url = base_url.into().trim_end_matches('/').to_string();
        self.connect_url = url.clone();
        self.base_url = url;
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub(crate) fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }

    pub fn webhook_secret(&self) -> &str {
        self.webhook_secret.expose_secret()
    }
}
