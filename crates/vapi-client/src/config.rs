//! Configuration for the AI-platform client.

use std::env;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::VapiError;

#[derive(Debug, Clone)]
pub struct VapiConfig {
    pub base_url: String,
    api_key: SecretString,
    /// Shared secret sent as `server.secret` on assistants and tools, and
    /// echoed back by the platform in `x-vapi-secret`.
    server_secret: Option<SecretString>,
    /// Per-request timeout. Tool and webhook registration calls use this too.
    pub timeout: Duration,
}

impl VapiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.vapi.ai".to_string(),
            api_key: SecretString::from(api_key.into()),
            server_secret: None,
            timeout: Duration::from_secs(20),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required: `VAPI_API_KEY`. Optional: `VAPI_BASE_URL`,
    /// `VAPI_WEBHOOK_SECRET`.
    pub fn from_env() -> Result<Self, VapiError> {
        let api_key = env::var("VAPI_API_KEY")
            .map_err(|_| VapiError::Config("VAPI_API_KEY is required".to_string()))?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = env::var("VAPI_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Ok(secret) = env::var("VAPI_WEBHOOK_SECRET") {
            if !secret.trim().is_empty() {
                config = config.with_server_secret(secret.trim());
            }
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_server_secret(mut self, secret: impl Into<String>) -> Self {
        self.server_secret = Some(SecretString::from(secret.into()));
        self
    }

    pub fn server_secret(&self) -> Option<&str> {
        self.server_secret.as_ref().map(|s| s.expose_secret())
    }

    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}
