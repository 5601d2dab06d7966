//! Application state shared across handlers.

use std::sync::Arc;

use agent_tools::{default_registry, ToolError, ToolRegistry, ToolServices, ToolsConfig};
use database::Database;
use ghl_client::GhlClient;
use mailer::MailSender;
use stripe_client::StripeClient;
use twilio_client::TwilioClient;
use vapi_client::VapiClient;

use crate::broker::TokenBroker;
use crate::config::Config;

/// Vendor clients the server talks to.
pub struct Vendors {
    pub ghl: GhlClient,
    pub vapi: VapiClient,
    pub twilio: TwilioClient,
    pub stripe: StripeClient,
    pub tools: ToolsConfig,
    pub mailer: Option<Arc<dyn MailSender>>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub broker: Arc<TokenBroker>,
    pub vapi: VapiClient,
    pub twilio: TwilioClient,
    pub stripe: StripeClient,
    /// Tools the assistants can call.
    pub tools: Arc<ToolRegistry>,
    pub tool_services: Arc<ToolServices>,
}

impl AppState {
    /// Create new application state.
    pub fn new(db: Database, config: Config, vendors: Vendors) -> Result<Self, ToolError> {
        let broker = Arc::new(TokenBroker::new(db.pool().clone(), vendors.ghl.clone()));
        let tool_timeout = vendors.tools.tool_timeout;

        let mut services = ToolServices::new(
            db.pool().clone(),
            vendors.ghl,
            broker.clone(),
            vendors.tools,
        )?;
        if let Some(mailer) = vendors.mailer {
            services = services.with_mailer(mailer);
        }

        Ok(Self {
            db,
            config: Arc::new(config),
            broker,
            vapi: vendors.vapi,
            twilio: vendors.twilio,
            stripe: vendors.stripe,
            tools: Arc::new(default_registry().with_timeout(tool_timeout)),
            tool_services: Arc::new(services),
        })
    }
}
