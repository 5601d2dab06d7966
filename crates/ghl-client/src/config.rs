//! Configuration for the CRM client.

use std::env;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::GhlError;

/// Scopes requested for the agency-level marketplace app.
pub const DEFAULT_SCOPES: &str = "locations.readonly oauth.write oauth.readonly \
contacts.readonly contacts.write calendars.readonly calendars.write \
calendars/events.readonly calendars/events.write";

/// Configuration for [`GhlClient`](crate::GhlClient).
#[derive(Debug, Clone)]
pub struct GhlConfig {
    /// REST base URL.
    pub base_url: String,
    /// Marketplace consent screen URL.
    pub authorize_url: String,
    /// Marketplace app client id.
    pub client_id: String,
    client_secret: SecretString,
    /// Space separated OAuth scopes.
    pub scopes: String,
    /// Value of the `Version` header.
    pub api_version: String,
    /// Timeout for token endpoint calls.
    pub token_timeout: Duration,
    /// Timeout for every other call.
    pub timeout: Duration,
}

impl GhlConfig {
    /// Create a configuration with production endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            base_url: "https://services.leadconnectorhq.com".to_string(),
            authorize_url: "https://marketplace.gohighlevel.com/oauth/chooselocation".to_string(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            scopes: DEFAULT_SCOPES.to_string(),
            api_version: "2021-07-28".to_string(),
            token_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `GHL_CLIENT_ID`
    /// - `GHL_CLIENT_SECRET`
    ///
    /// Optional:
    /// - `GHL_BASE_URL` - Default: https://services.leadconnectorhq.com
    /// - `GHL_SCOPES` - Default: [`DEFAULT_SCOPES`]
    pub fn from_env() -> Result<Self, GhlError> {
        let client_id = env::var("GHL_CLIENT_ID")
            .map_err(|_| GhlError::Config("GHL_CLIENT_ID is required".to_string()))?;
        let client_secret = env::var("GHL_CLIENT_SECRET")
            .map_err(|_| GhlError::Config("GHL_CLIENT_SECRET is required".to_string()))?;

        let mut config = Self::new(client_id, client_secret);
        if let Ok(base_url) = env::var("GHL_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Ok(scopes) = env::var("GHL_SCOPES") {
            config.scopes = scopes;
        }
        Ok(config)
    }

    /// Builder method to point at another base URL (tests, sandboxes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builder method to set the general request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }

    /// Build the consent URL the user is redirected to.
    pub fn consent_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?response_type=code&redirect_uri={}&client_id={}&scope={}&state={}",
            self.authorize_url,
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.scopes),
            urlencoding::encode(state),
        )
    }
}
