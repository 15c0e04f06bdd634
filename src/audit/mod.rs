pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RecordError;

pub use postgres::PgAuditRecorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Sent,
    Failed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Sent => "sent",
            AuditStatus::Failed => "failed",
        }
    }
}

/// Outcome of one notification attempt. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub email: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub status: AuditStatus,
    pub error_detail: Option<String>,
}

impl AuditRecord {
    pub fn sent(email: &str, content: &str) -> Self {
        Self::new(email, content, AuditStatus::Sent, None)
    }

    pub fn failed(email: &str, content: &str, error: impl Into<String>) -> Self {
        Self::new(email, content, AuditStatus::Failed, Some(error.into()))
    }

    fn new(email: &str, content: &str, status: AuditStatus, error_detail: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            email: email.to_string(),
            timestamp: Utc::now(),
            content: content.to_string(),
            status,
            error_detail,
        }
    }
}

#[async_trait]
pub trait AuditRecorder: Send + Sync {
    /// Append `record`. Implementations must never overwrite an existing id.
    async fn record(&self, record: &AuditRecord) -> Result<(), RecordError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_record_gets_a_fresh_id() {
        let a = AuditRecord::sent("a@x.com", "hi");
        let b = AuditRecord::sent("a@x.com", "hi");
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, AuditStatus::Sent);
        assert_eq!(a.error_detail, None);
    }

    #[test]
    fn failed_records_keep_error_detail() {
        let record = AuditRecord::failed("a@x.com", "hi", "connection refused");
        assert_eq!(record.status.as_str(), "failed");
        assert_eq!(record.error_detail.as_deref(), Some("connection refused"));
    }
}
