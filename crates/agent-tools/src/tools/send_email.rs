//! Outbound email on the assistant's behalf.

use async_trait::async_trait;
use database::validation::validate_email;
use mailer::{Email, MailSender};
use tracing::info;

use crate::error::ToolError;
use crate::tool::{ParamKind, ParamSpec, Tool, ToolArgs, ToolOutput};

pub struct SendEmail;

#[async_trait]
impl Tool for SendEmail {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send an email, for example a confirmation or follow-up."
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::required("to", ParamKind::String, "Recipient email address"),
            ParamSpec::required("subject", ParamKind::String, "Subject line"),
            ParamSpec::required("body", ParamKind::String, "Plain text body"),
        ];
        PARAMS
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let to = args.get_string("to")?;
        validate_email(&to).map_err(|e| ToolError::invalid("to", e.to_string()))?;

        let mailer = args
            .ctx
            .services
            .mailer
            .as_ref()
            .ok_or(ToolError::NotConfigured("Email"))?;

        let email = Email::new(&to, args.get_string("subject")?, args.get_string("body")?);
        mailer.send(&email).await?;

        info!(assistant_id = %args.ctx.scope.assistant_id, "Assistant sent email");
        Ok(ToolOutput::success(format!("Email sent to {}.", to)))
    }
}
