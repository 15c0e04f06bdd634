#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde_json::{Value, json};

use submission_relay::audit::{AuditRecord, AuditRecorder};
use submission_relay::config::StageTimeouts;
use submission_relay::error::{NotifyError, PublishError, RecordError};
use submission_relay::event::SubmissionEvent;
use submission_relay::notify::Notifier;
use submission_relay::storage::BlobStore;

/// Bind `router` to a random local port and serve it in the background.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    addr
}

pub fn timeouts() -> StageTimeouts {
    StageTimeouts {
        fetch: Duration::from_secs(5),
        publish: Duration::from_secs(5),
        notify: Duration::from_secs(5),
        record: Duration::from_secs(5),
    }
}

pub fn event(url: &str, email: &str, assignment: &str) -> SubmissionEvent {
    SubmissionEvent {
        submission_url: url.to_string(),
        user_email: email.to_string(),
        assignment_id: assignment.to_string(),
    }
}

/// Wrap a submission message the way the notification topic delivers it.
pub fn envelope(message: &Value) -> Value {
    json!({
        "Records": [{
            "EventSource": "aws:sns",
            "EventVersion": "1.0",
            "Sns": {
                "Type": "Notification",
                "MessageId": "95df01b4-ee98-5cb9-9903-4c221d41eb5e",
                "Message": message.to_string(),
            }
        }]
    })
}

// ── Download origin ─────────────────────────────────────────────

/// Serves `/a.zip` (10 bytes), `/missing` (404), `/empty` (200, no body),
/// `/broken` (500) and `/slow` (answers after 3s).
pub async fn spawn_origin() -> SocketAddr {
    let router = Router::new()
        .route("/a.zip", get(|| async { Bytes::from_static(b"PK\x03\x04zipzip") }))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/empty", get(|| async { StatusCode::OK }))
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Bytes::from_static(b"late")
            }),
        );
    serve(router).await
}

// ── Object storage API ──────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Upload {
    pub bucket: String,
    pub name: String,
    pub authorization: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Default)]
pub struct StorageApi {
    pub uploads: Mutex<Vec<Upload>>,
    pub token_requests: Mutex<Vec<HashMap<String, String>>>,
}

/// Mimics the storage media-upload endpoint and the OAuth token endpoint.
/// Uploads into bucket `locked` are refused with 403.
pub async fn spawn_storage_api() -> (SocketAddr, Arc<StorageApi>) {
    let api = Arc::new(StorageApi::default());

    async fn upload(
        State(api): State<Arc<StorageApi>>,
        Path(bucket): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> impl IntoResponse {
        if bucket == "locked" {
            return (
                StatusCode::FORBIDDEN,
                axum::Json(json!({ "error": { "message": "permission denied" } })),
            );
        }
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        let name = query.get("name").cloned().unwrap_or_default();
        api.uploads.lock().unwrap().push(Upload {
            bucket: bucket.clone(),
            name: name.clone(),
            authorization: header("authorization"),
            content_type: header("content-type"),
            body: body.to_vec(),
        });
        (
            StatusCode::OK,
            axum::Json(json!({ "bucket": bucket, "name": name, "size": body.len().to_string() })),
        )
    }

    async fn token(
        State(api): State<Arc<StorageApi>>,
        Form(form): Form<HashMap<String, String>>,
    ) -> impl IntoResponse {
        api.token_requests.lock().unwrap().push(form);
        axum::Json(json!({
            "access_token": "minted-token",
            "expires_in": 3599,
            "token_type": "Bearer",
        }))
    }

    let router = Router::new()
        .route("/upload/storage/v1/b/{bucket}/o", post(upload))
        .route("/token", post(token))
        .with_state(api.clone());

    (serve(router).await, api)
}

// ── Mail API ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Mail {
    pub domain: String,
    pub authorization: String,
    pub form: HashMap<String, String>,
}

#[derive(Default)]
pub struct MailApi {
    pub sent: Mutex<Vec<Mail>>,
}

/// Mimics the Mailgun messages endpoint. Mail to `bounce@x.com` is refused.
pub async fn spawn_mail_api() -> (SocketAddr, Arc<MailApi>) {
    let api = Arc::new(MailApi::default());

    async fn messages(
        State(api): State<Arc<MailApi>>,
        Path(domain): Path<String>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> impl IntoResponse {
        if form.get("to").map(String::as_str) == Some("bounce@x.com") {
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(json!({ "message": "'to' parameter is not a valid address" })),
            );
        }
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        api.sent.lock().unwrap().push(Mail {
            domain,
            authorization,
            form,
        });
        (
            StatusCode::OK,
            axum::Json(json!({ "id": "<20240309.1@mg.example.com>", "message": "Queued. Thank you." })),
        )
    }

    let router = Router::new()
        .route("/v3/{domain}/messages", post(messages))
        .with_state(api.clone());

    (serve(router).await, api)
}

// ── In-process fakes ────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<Vec<(String, String, Bytes)>>,
    pub fail: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), PublishError> {
        if self.fail {
            return Err(PublishError::Status {
                status: "403 Forbidden".to_string(),
                body: "permission denied".to_string(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), body));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, email: &str, message: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), message.to_string()));
        if self.fail {
            return Err(NotifyError::Request("connection refused".to_string()));
        }
        Ok(())
    }
}

/// Notifier that never finishes within a test's deadline.
pub struct StalledNotifier;

#[async_trait]
impl Notifier for StalledNotifier {
    async fn notify(&self, _email: &str, _message: &str) -> Result<(), NotifyError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRecorder {
    pub records: Mutex<Vec<AuditRecord>>,
    pub fail: bool,
}

impl MemoryRecorder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn all(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditRecorder for MemoryRecorder {
    async fn record(&self, record: &AuditRecord) -> Result<(), RecordError> {
        if self.fail {
            return Err(RecordError::Database(sqlx::Error::PoolTimedOut));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
