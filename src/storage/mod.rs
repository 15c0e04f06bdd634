pub mod gcs;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::PublishError;

pub use gcs::GcsStore;

/// Host that serves published objects to end users.
pub const PUBLIC_BASE_URL: &str = "https://storage.googleapis.com";

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `body` to `bucket/key`, replacing any existing object.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), PublishError>;
}

/// Naming inputs for one published object.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub owner_email: String,
    pub assignment_id: String,
    pub timestamp: DateTime<Utc>,
}

impl UploadRecord {
    pub fn new(owner_email: &str, assignment_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            owner_email: owner_email.to_string(),
            assignment_id: assignment_id.to_string(),
            timestamp,
        }
    }

    /// `{safe_email}_{assignment_id}_{YYYYMMDDHHMMSS}`.
    ///
    /// Two uploads for the same owner and assignment within the same second
    /// map to the same key.
    pub fn derived_key(&self) -> String {
        format!(
            "{}_{}_{}",
            safe_email(&self.owner_email),
            self.assignment_id,
            compact_timestamp(&self.timestamp)
        )
    }
}

/// Replace every character outside `[A-Za-z0-9]` with `_`.
pub fn safe_email(email: &str) -> String {
    email
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn compact_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

pub fn public_locator(bucket: &str, key: &str) -> String {
    format!("{PUBLIC_BASE_URL}/{bucket}/{}", urlencoding::encode(key))
}

/// Writes submissions into a single bucket and hands back their public URLs.
#[derive(Clone)]
pub struct BlobPublisher {
    store: Arc<dyn BlobStore>,
    bucket: String,
}

impl BlobPublisher {
    pub fn new(store: Arc<dyn BlobStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn publish(
        &self,
        body: Bytes,
        owner_email: &str,
        assignment_id: &str,
        at: DateTime<Utc>,
    ) -> Result<String, PublishError> {
        let key = UploadRecord::new(owner_email, assignment_id, at).derived_key();
        let size = body.len();

        self.store.put_object(&self.bucket, &key, body).await?;

        tracing::info!("Published {size} bytes to {}/{key}", self.bucket);
        Ok(public_locator(&self.bucket, &key))
    }
}
