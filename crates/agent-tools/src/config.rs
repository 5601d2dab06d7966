//! Configuration for the third-party services tools call.

use std::env;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

/// Credentials and endpoints for search, scrape and dispatch limits.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    tavily_api_key: Option<SecretString>,
    pub tavily_base_url: String,
    firecrawl_api_key: Option<SecretString>,
    pub firecrawl_base_url: String,
    /// Per-request timeout for search and scrape.
    pub http_timeout: Duration,
    /// Upper bound on a single tool execution.
    pub tool_timeout: Duration,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            tavily_base_url: "https://api.tavily.com".to_string(),
            firecrawl_api_key: None,
            firecrawl_base_url: "https://api.firecrawl.dev".to_string(),
            http_timeout: Duration::from_secs(30),
            tool_timeout: Duration::from_secs(20),
        }
    }
}

impl ToolsConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional:
    /// - `TAVILY_API_KEY` - enables `web_search`
    /// - `FIRECRAWL_API_KEY` - enables `scrape_website`
    /// - `HTTP_TIMEOUT_SECS` - Default: 30
    /// - `TOOL_TIMEOUT_SECS` - Default: 20
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.tavily_api_key = env::var("TAVILY_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .map(SecretString::from);
        config.firecrawl_api_key = env::var("FIRECRAWL_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .map(SecretString::from);
        if let Some(secs) = env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env::var("TOOL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.tool_timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_tavily(mut self, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        self.tavily_api_key = Some(SecretString::from(api_key.into()));
        self.tavily_base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_firecrawl(
        mut self,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        self.firecrawl_api_key = Some(SecretString::from(api_key.into()));
        self.firecrawl_base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn tavily_api_key(&self) -> Option<&str> {
        self.tavily_api_key.as_ref().map(|k| k.expose_secret())
    }

    pub(crate) fn firecrawl_api_key(&self) -> Option<&str> {
        self.firecrawl_api_key.as_ref().map(|k| k.expose_secret())
    }
}
