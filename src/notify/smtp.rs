use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::Notifier;
use crate::error::{ConfigError, NotifyError};
use crate::secrets::SmtpCredentials;

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    subject: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpCredentials, subject: impl Into<String>) -> Result<Self, ConfigError> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| ConfigError::invalid("smtp host", e))?
            .port(config.port)
            .credentials(creds)
            .build();

        let from = config
            .from
            .parse()
            .map_err(|e| ConfigError::invalid("smtp from", e))?;

        Ok(Self {
            transport,
            from,
            subject: subject.into(),
        })
    }

    fn build(&self, to: &str, text: &str) -> Result<Message, NotifyError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| NotifyError::Address(format!("{to}: {e}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(self.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(text.to_string())
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, email: &str, message: &str) -> Result<(), NotifyError> {
        let message = self.build(email, message)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> SmtpNotifier {
        SmtpNotifier::new(
            &SmtpCredentials {
                host: "smtp.example.com".to_string(),
                port: 587,
                user: "relay".to_string(),
                pass: "secret".to_string(),
                from: "Submissions <noreply@example.com>".to_string(),
            },
            "Your Assignment Submission",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn builds_plain_text_message() {
        let message = notifier().build("a.b@x.com", "hello").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: a.b@x.com"));
        assert!(raw.contains("Subject: Your Assignment Submission"));
        assert!(raw.contains("Content-Type: text/plain"));
        assert!(raw.contains("hello"));
    }

    #[tokio::test]
    async fn invalid_recipient_is_an_address_error() {
        let err = notifier().build("nope", "hello").unwrap_err();
        assert!(matches!(err, NotifyError::Address(_)));
    }

    #[tokio::test]
    async fn invalid_sender_is_a_config_error() {
        let result = SmtpNotifier::new(
            &SmtpCredentials {
                host: "smtp.example.com".to_string(),
                port: 587,
                user: "relay".to_string(),
                pass: "secret".to_string(),
                from: "not an address".to_string(),
            },
            "Subject",
        );
        assert!(result.is_err());
    }
}
