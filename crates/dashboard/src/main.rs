//! Agency dashboard server.

use std::sync::Arc;

use agent_tools::ToolsConfig;
use dashboard::{app, AppState, Config, Vendors};
use database::Database;
use ghl_client::{GhlClient, GhlConfig};
use mailer::{MailSender, MailerConfig, SmtpMailer};
use stripe_client::{StripeClient, StripeConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use twilio_client::{TwilioClient, TwilioConfig};
use vapi_client::{VapiClient, VapiConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dashboard=debug")),
        )
        .init();

    let config = Config::from_env()?;
    info!(addr = %config.addr, public_url = %config.public_url, "Starting dashboard server");

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    // Vendor clients
    let ghl = GhlClient::new(GhlConfig::from_env()?)?;
    let vapi = VapiClient::new(VapiConfig::from_env()?)?;
    if vapi.config().server_secret().is_none() {
        warn!("VAPI_WEBHOOK_SECRET not set, server messages are not authenticated");
    }
    let twilio = TwilioClient::new(TwilioConfig::from_env()?.with_timeout(config.http_timeout))?;
    let stripe = StripeClient::new(StripeConfig::from_env()?)?;

    let mailer: Option<Arc<dyn MailSender>> = match MailerConfig::from_env() {
        Ok(mail_config) => {
            let smtp: Arc<dyn MailSender> = Arc::new(SmtpMailer::new(mail_config)?);
            Some(smtp)
        }
        Err(e) => {
            warn!(error = %e, "SMTP not configured, send_email tool disabled");
            None
        }
    };

    let vendors = Vendors {
        ghl,
        vapi,
        twilio,
        stripe,
        tools: ToolsConfig::from_env(),
        mailer,
    };
    let addr = config.addr;
    let state = AppState::new(db, config, vendors)?;

    info!(%addr, "Dashboard server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
