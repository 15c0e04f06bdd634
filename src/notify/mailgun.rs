use async_trait::async_trait;

use super::Notifier;
use crate::error::{NotifyError, truncate_body};
use crate::secrets::MailgunCredentials;

pub struct MailgunNotifier {
    client: reqwest::Client,
    api_base: String,
    credentials: MailgunCredentials,
    subject: String,
}

impl MailgunNotifier {
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        credentials: MailgunCredentials,
        subject: impl Into<String>,
    ) -> Self {
        let api_base: String = api_base.into();
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
            subject: subject.into(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/v3/{}/messages",
            self.api_base,
            urlencoding::encode(&self.credentials.domain)
        )
    }
}

#[async_trait]
impl Notifier for MailgunNotifier {
    async fn notify(&self, email: &str, message: &str) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth("api", Some(&self.credentials.api_key))
            .form(&[
                ("from", self.credentials.from_email.as_str()),
                ("to", email),
                ("subject", self.subject.as_str()),
                ("text", message),
            ])
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.to_string(),
                body: truncate_body(&body),
            });
        }

        Ok(())
    }
}
