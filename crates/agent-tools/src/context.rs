//! Per-call execution context shared by every tool in one webhook delivery.

use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use database::SqlitePool;
use ghl_client::GhlClient;
use mailer::MailSender;
use tokio::sync::OnceCell;

use crate::config::ToolsConfig;
use crate::error::ToolError;
use crate::tools::time;

/// Supplies sub-account CRM access tokens.
///
/// Implementations must persist any rotated refresh token before returning.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn location_token(&self, user_id: &str, account_id: &str) -> Result<String, ToolError>;
}

/// Long-lived handles the tools use. Built once at startup.
pub struct ToolServices {
    pub pool: SqlitePool,
    pub ghl: GhlClient,
    pub tokens: Arc<dyn TokenSource>,
    pub http: reqwest::Client,
    pub config: ToolsConfig,
    pub mailer: Option<Arc<dyn MailSender>>,
}

impl ToolServices {
    pub fn new(
        pool: SqlitePool,
        ghl: GhlClient,
        tokens: Arc<dyn TokenSource>,
        config: ToolsConfig,
    ) -> Result<Self, ToolError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            pool,
            ghl,
            tokens,
            http,
            config,
            mailer: None,
        })
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn MailSender>) -> Self {
        self.mailer = Some(mailer);
        self
    }
}

/// Who the tool calls are for, resolved from the assistant id in the
/// webhook payload.
#[derive(Debug, Clone, Default)]
pub struct CallScope {
    pub user_id: String,
    /// CRM location id of the assistant's sub-account.
    pub account_id: String,
    pub assistant_id: String,
    pub calendar_id: Option<String>,
    pub timezone: Option<String>,
    pub call_id: Option<String>,
    /// Caller's number, when the platform reported one.
    pub customer_number: Option<String>,
}

pub struct ToolContext {
    pub scope: CallScope,
    pub services: Arc<ToolServices>,
    crm_token: OnceCell<String>,
}

impl ToolContext {
    pub fn new(scope: CallScope, services: Arc<ToolServices>) -> Self {
        Self {
            scope,
            services,
            crm_token: OnceCell::new(),
        }
    }

    /// Sub-account token, fetched on first use and shared by later tools in
    /// the same delivery.
    pub async fn crm_token(&self) -> Result<&str, ToolError> {
        let token = self
            .crm_token
            .get_or_try_init(|| {
                self.services
                    .tokens
                    .location_token(&self.scope.user_id, &self.scope.account_id)
            })
            .await?;
        Ok(token.as_str())
    }

    /// Zone that offset-less times are read in.
    pub(crate) fn zone(&self) -> Tz {
        time::zone(self.scope.timezone.as_deref())
    }

    pub(crate) fn calendar_id(&self) -> Result<&str, ToolError> {
        self.scope
            .calendar_id
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                ToolError::ExecutionFailed("No calendar is linked to this assistant.".to_string())
            })
    }
}
