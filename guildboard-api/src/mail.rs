//! Outbound mail transports.

use async_trait::async_trait;
use guildboard_common::model::user::EmailAddress;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    address::AddressError,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid mail address: {0}")]
    Address(#[from] AddressError),
    #[error("Failed to build email message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Email {
    pub to: EmailAddress,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers one plain-text email. Returns once the transport accepted it.
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Delivers through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings, from: &str) -> Result<Self, MailError> {
        let from = from.parse::<Mailbox>()?;

        let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port);
        let builder = match (&settings.username, &settings.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let to = email.to.get().parse::<Mailbox>()?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)?;

        self.transport.send(message).await?;
        info!(to = %email.to, subject = %email.subject, "Email sent");

        Ok(())
    }
}

/// Logs emails instead of delivering them.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    #[must_use]
    pub fn new(from: String) -> Self {
        Self { from }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(
            from = %self.from,
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "No SMTP host configured, not delivering email"
        );

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use crate::mail::{
        Email, LogMailer, Mailer, SmtpMailer, SmtpSettings, testing::RecordingMailer,
    };
    use guildboard_common::model::user::EmailAddress;

    fn email() -> Email {
        Email {
            to: EmailAddress::new("rogue@guild.example".to_owned()).unwrap(),
            subject: "Тема".to_owned(),
            body: "Текст".to_owned(),
        }
    }

    #[tokio::test]
    async fn log_mailer_accepts_everything() {
        LogMailer::new("noreply@guild.example".to_owned())
            .send(email())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn recording_mailer_filters_by_recipient() {
        let mailer = RecordingMailer::default();
        mailer.send(email()).await.unwrap();

        assert_eq!(mailer.sent_to("rogue@guild.example"), [email()]);
        assert!(mailer.sent_to("someone@else.example").is_empty());
    }

    #[test]
    fn smtp_mailer_rejects_a_bad_sender() {
        let settings = SmtpSettings {
            host: "smtp.guild.example".to_owned(),
            port: 587,
            username: None,
            password: None,
        };

        assert!(SmtpMailer::new(&settings, "not an address").is_err());
    }
}
