use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Reason a submission URL could not be turned into bytes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DownloadError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid URL: downloads from {0} are not allowed")]
    Blocked(String),
    #[error(
        "The provided URL for the assignment submission is invalid or the file could not be downloaded. Please check the URL and try again. ({0})"
    )]
    Request(String),
    #[error(
        "The provided URL for the assignment submission is invalid or the file could not be downloaded. Please check the URL and try again. (HTTP {status})"
    )]
    Status { status: String },
    #[error("Invalid URL: Unable to download the file.")]
    Empty,
    #[error("The download did not finish within {0}s")]
    Timeout(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Storage authentication failed: {0}")]
    Auth(String),
    #[error("Storage request failed: {0}")]
    Request(String),
    #[error("Storage rejected the upload (HTTP {status}): {body}")]
    Status { status: String, body: String },
    #[error("The upload did not finish within {0}s")]
    Timeout(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid address: {0}")]
    Address(String),
    #[error("Failed to build email: {0}")]
    Build(String),
    #[error("Failed to send email: {0}")]
    Request(String),
    #[error("Mail provider rejected the message (HTTP {status}): {body}")]
    Rejected { status: String, body: String },
    #[error("Email delivery did not finish within {0}s")]
    Timeout(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Audit write did not finish within {0}s")]
    Timeout(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),
    #[error("Invalid {key}: {reason}")]
    Invalid { key: String, reason: String },
    #[error("Secret {name} unavailable: {reason}")]
    Secret { name: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: &str, reason: impl std::fmt::Display) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn secret(name: &str, reason: impl std::fmt::Display) -> Self {
        ConfigError::Secret {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Inbound event that cannot be processed at all.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Invalid event JSON: {0}")]
    Envelope(String),
    #[error("Event contains no records")]
    NoRecords,
    #[error("Event contains {0} records, expected exactly one")]
    MultipleRecords(usize),
    #[error("Invalid submission message: {0}")]
    Message(String),
    #[error("Invalid userEmail '{0}'")]
    Email(String),
}

/// Handler-level failure. Every decoded event is answered 200, so the only
/// error a route can return is a request it refuses to process.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<EventError> for AppError {
    fn from(err: EventError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Clip a provider's error body before it lands in an error message.
pub(crate) fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_failure_mentions_remote_status_text() {
        let err = DownloadError::Status {
            status: "404 Not Found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("could not be downloaded"));
        assert!(msg.ends_with("(HTTP 404 Not Found)"));
    }

    #[test]
    fn event_errors_become_bad_requests() {
        let err: AppError = EventError::NoRecords.into();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Event contains no records"));
    }

    #[test]
    fn bad_request_renders_as_400() {
        let resp = AppError::from(EventError::MultipleRecords(2)).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn provider_bodies_are_clipped_on_char_boundaries() {
        assert_eq!(truncate_body("short"), "short");
        let long = "é".repeat(600);
        let clipped = truncate_body(&long);
        assert_eq!(clipped.chars().count(), 512);
        assert!(long.starts_with(&clipped));
    }
}
