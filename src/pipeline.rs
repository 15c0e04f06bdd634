//! Drives one submission through fetch, publish, notify and record.
//!
//! Stages run strictly in order. A fetch or publish failure skips straight to
//! notifying the submitter about the failure, and a notify failure is folded
//! into the audit record. Every accepted event therefore produces exactly one
//! notification attempt and exactly one audit write attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::audit::{AuditRecord, AuditRecorder, AuditStatus};
use crate::config::StageTimeouts;
use crate::error::{DownloadError, NotifyError, PublishError, RecordError};
use crate::event::SubmissionEvent;
use crate::fetch::Fetcher;
use crate::notify::{self, Notifier};
use crate::storage::BlobPublisher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Publish,
    Notify,
    Record,
}

/// Terminal state of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutcome {
    pub audit_id: Uuid,
    pub status: AuditStatus,
    /// Public URL of the published object, when publishing succeeded.
    pub locator: Option<String>,
    /// First stage that failed, if any.
    pub failed_stage: Option<Stage>,
    /// Whether the audit record was durably written.
    pub recorded: bool,
}

/// Stage error folded into the text sent to the submitter.
enum StageFailure {
    Download(DownloadError),
    Publish(PublishError),
}

impl StageFailure {
    fn stage(&self) -> Stage {
        match self {
            StageFailure::Download(_) => Stage::Fetch,
            StageFailure::Publish(_) => Stage::Publish,
        }
    }
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageFailure::Download(e) => write!(f, "{e}"),
            StageFailure::Publish(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    publisher: BlobPublisher,
    notifier: Arc<dyn Notifier>,
    recorder: Arc<dyn AuditRecorder>,
    timeouts: StageTimeouts,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        publisher: BlobPublisher,
        notifier: Arc<dyn Notifier>,
        recorder: Arc<dyn AuditRecorder>,
        timeouts: StageTimeouts,
    ) -> Self {
        Self {
            fetcher,
            publisher,
            notifier,
            recorder,
            timeouts,
        }
    }

    pub async fn run(&self, event: &SubmissionEvent) -> PipelineOutcome {
        let span = tracing::info_span!(
            "submission",
            assignment_id = %event.assignment_id,
            bucket = %self.publisher.bucket(),
        );
        self.run_stages(event).instrument(span).await
    }

    async fn run_stages(&self, event: &SubmissionEvent) -> PipelineOutcome {
        tracing::info!("Processing submission");

        let (message, locator, failed_stage) = match self.fetch_and_publish(event).await {
            Ok(locator) => (notify::success_message(&locator), Some(locator), None),
            Err(failure) => {
                tracing::warn!("Submission failed at {:?} stage: {failure}", failure.stage());
                (notify::failure_message(&failure), None, Some(failure.stage()))
            }
        };

        let record = match self.notify(&event.user_email, &message).await {
            Ok(()) => {
                tracing::info!("Notification sent");
                AuditRecord::sent(&event.user_email, &message)
            }
            Err(e) => {
                tracing::error!("Notification failed: {e}");
                AuditRecord::failed(&event.user_email, &message, e.to_string())
            }
        };

        let recorded = match self.record(&record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    audit_id = %record.id,
                    status = record.status.as_str(),
                    "Failed to write audit record: {e}"
                );
                false
            }
        };

        let failed_stage = failed_stage
            .or((record.status == AuditStatus::Failed).then_some(Stage::Notify))
            .or((!recorded).then_some(Stage::Record));

        PipelineOutcome {
            audit_id: record.id,
            status: record.status,
            locator,
            failed_stage,
            recorded,
        }
    }

    async fn fetch_and_publish(&self, event: &SubmissionEvent) -> Result<String, StageFailure> {
        let body = bounded(self.timeouts.fetch, self.fetcher.fetch(&event.submission_url))
            .await
            .unwrap_or_else(|| Err(DownloadError::Timeout(self.timeouts.fetch.as_secs())))
            .map_err(StageFailure::Download)?;

        let publish = self.publisher.publish(
            body,
            &event.user_email,
            &event.assignment_id,
            Utc::now(),
        );
        bounded(self.timeouts.publish, publish)
            .await
            .unwrap_or_else(|| Err(PublishError::Timeout(self.timeouts.publish.as_secs())))
            .map_err(StageFailure::Publish)
    }

    async fn notify(&self, email: &str, message: &str) -> Result<(), NotifyError> {
        bounded(self.timeouts.notify, self.notifier.notify(email, message))
            .await
            .unwrap_or_else(|| Err(NotifyError::Timeout(self.timeouts.notify.as_secs())))
    }

    async fn record(&self, record: &AuditRecord) -> Result<(), RecordError> {
        bounded(self.timeouts.record, self.recorder.record(record))
            .await
            .unwrap_or_else(|| Err(RecordError::Timeout(self.timeouts.record.as_secs())))
    }
}

/// Run `fut` with a deadline. `None` means the deadline passed and `fut` was dropped.
async fn bounded<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(limit, fut).await.ok()
}
