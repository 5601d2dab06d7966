use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, instrument};

use crate::{Email, MailerConfig, MailerError};

/// Anything that can deliver an [`Email`].
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailerError>;
}

/// Pooled SMTP relay client.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: MailerConfig) -> Result<Self, MailerError> {
        let creds = Credentials::new(config.username.clone(), config.password().to_string());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            "Created SMTP mailer"
        );

        Ok(Self {
            transport,
            from: config.from_header(),
        })
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    #[instrument(skip(self, email), fields(to = ?email.to, subject = %email.subject))]
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        let message = build_message(&self.from, email)?;

        self.transport.send(message).await?;

        info!("Email sent");
        Ok(())
    }
}

fn mailbox(header: &'static str, value: &str) -> Result<Mailbox, MailerError> {
    value.parse::<Mailbox>().map_err(|source| MailerError::Address {
        header,
        value: value.to_string(),
        source,
    })
}

pub(crate) fn build_message(from: &str, email: &Email) -> Result<Message, MailerError> {
    if email.to.is_empty() {
        return Err(MailerError::NoRecipients);
    }

    let mut builder = Message::builder()
        .from(mailbox("From", from)?)
        .subject(&email.subject);
    for to in &email.to {
        builder = builder.to(mailbox("To", to)?);
    }
    if let Some(reply_to) = &email.reply_to {
        builder = builder.reply_to(mailbox("Reply-To", reply_to)?);
    }

    let message = match &email.html_body {
        Some(html) => builder.multipart(
            MultiPart::alternative()
                .singlepart(SinglePart::plain(email.body.clone()))
                .singlepart(SinglePart::html(html.clone())),
        ),
        None => builder.body(email.body.clone()),
    }?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_plain_message() {
        let email = Email::new("lead@example.com", "Your appointment", "See you at 9.");
        let message = build_message("Front Desk <desk@example.com>", &email).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: lead@example.com"));
        assert!(raw.contains("Subject: Your appointment"));
    }

    #[test]
    fn test_invalid_recipient() {
        let email = Email::new("not-an-address", "s", "b");
        let err = build_message("desk@example.com", &email).unwrap_err();
        assert!(matches!(err, MailerError::Address { header: "To", .. }));
    }

    #[test]
    fn test_no_recipients() {
        let mut email = Email::new("a@example.com", "s", "b");
        email.to.clear();
        assert!(matches!(
            build_message("desk@example.com", &email),
            Err(MailerError::NoRecipients)
        ));
    }
}
