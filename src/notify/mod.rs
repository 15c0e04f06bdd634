pub mod mailgun;
pub mod smtp;

use async_trait::async_trait;

use crate::error::NotifyError;

pub use mailgun::MailgunNotifier;
pub use smtp::SmtpNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` as a plain-text email to `email`.
    async fn notify(&self, email: &str, message: &str) -> Result<(), NotifyError>;
}

pub fn success_message(locator: &str) -> String {
    format!(
        "Your assignment has been successfully uploaded. You can access the uploaded file here: {locator}"
    )
}

pub fn failure_message(reason: &dyn std::fmt::Display) -> String {
    format!("Error in assignment submission: {reason}")
}
