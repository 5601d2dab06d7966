//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

/// Dashboard server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Externally reachable base URL of this server. Vendor webhooks and
    /// OAuth redirect URIs are built from it.
    pub public_url: String,
    /// Base URL of the frontend, target of OAuth result redirects.
    pub frontend_url: String,
    jwt_secret: SecretString,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Default timeout for outbound requests.
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `DASHBOARD_ADDR` | Server bind address | `127.0.0.1:8790` |
    /// | `DATABASE_URL` | SQLite database URL | `sqlite:dashboard.db?mode=rwc` |
    /// | `PUBLIC_URL` | Webhook and OAuth redirect base | `http://127.0.0.1:8790` |
    /// | `FRONTEND_URL` | Frontend base for redirects | `http://localhost:3000` |
    /// | `JWT_SECRET` | HS256 signing secret | (required) |
    /// | `ACCESS_TOKEN_TTL_SECS` | Access token lifetime | `900` |
    /// | `REFRESH_TOKEN_TTL_SECS` | Refresh session lifetime | `2592000` |
    /// | `HTTP_TIMEOUT_SECS` | Outbound request timeout | `30` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("DASHBOARD_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8790".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:dashboard.db?mode=rwc".to_string());

        let public_url =
            env::var("PUBLIC_URL").unwrap_or_else(|_| "http://127.0.0.1:8790".to_string());
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingJwtSecret)?;

        let mut config = Self::new(jwt_secret)
            .with_public_url(public_url)
            .with_frontend_url(frontend_url);
        config.addr = addr;
        config.database_url = database_url;
        config.access_token_ttl = secs_var("ACCESS_TOKEN_TTL_SECS", 900)?;
        config.refresh_token_ttl = secs_var("REFRESH_TOKEN_TTL_SECS", 2_592_000)?;
        config.http_timeout = secs_var("HTTP_TIMEOUT_SECS", 30)?;
        Ok(config)
    }

    /// Defaults with the given signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8790)),
            database_url: "sqlite:dashboard.db?mode=rwc".to_string(),
            public_url: "http://127.0.0.1:8790".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            jwt_secret: SecretString::from(jwt_secret.into()),
            access_token_ttl: Duration::from_secs(900),
            refresh_token_ttl: Duration::from_secs(2_592_000),
            http_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_frontend_url(mut self, url: impl Into<String>) -> Self {
        self.frontend_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.expose_secret().as_bytes()
    }

    /// Absolute URL on this server.
    pub fn public(&self, path: &str) -> String {
        format!("{}{}", self.public_url, path)
    }

    /// Only mark cookies `Secure` when served over TLS.
    pub(crate) fn secure_cookies(&self) -> bool {
        self.public_url.starts_with("https://")
    }
}

fn secs_var(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidNumber(name)),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid DASHBOARD_ADDR format")]
    InvalidAddr,

    #[error("JWT_SECRET environment variable is required")]
    MissingJwtSecret,

    #[error("{0} must be a whole number of seconds")]
    InvalidNumber(&'static str),
}
