pub mod audit;
pub mod config;
pub mod error;
pub mod event;
pub mod fetch;
pub mod notify;
pub mod pipeline;
pub mod routes;
pub mod secrets;
pub mod state;
pub mod storage;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::audit::AuditRecorder;
use crate::config::{Config, NotifierKind};
use crate::error::ConfigError;
use crate::fetch::HttpFetcher;
use crate::notify::{MailgunNotifier, Notifier, SmtpNotifier};
use crate::pipeline::Pipeline;
use crate::secrets::{MailgunCredentials, SmtpCredentials, StorageCredentials};
use crate::state::{AppState, SharedState};
use crate::storage::{BlobPublisher, GcsStore};

/// Resolve credentials and construct every provider client once.
pub async fn build_pipeline(
    config: &Config,
    recorder: Arc<dyn AuditRecorder>,
) -> Result<Pipeline, ConfigError> {
    let source = secrets::source_for(&config.secrets);

    let client = reqwest::Client::builder()
        .user_agent(concat!("submission-relay/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConfigError::invalid("http client", e))?;

    let storage_creds: StorageCredentials =
        secrets::load(source.as_ref(), &config.storage_secret).await?;
    let store = GcsStore::new(client.clone(), &config.gcs_api_base, &storage_creds)?;
    match &storage_creds {
        StorageCredentials::ServiceAccount(sa) => {
            tracing::info!("Object storage configured for service account {}", sa.client_email)
        }
        StorageCredentials::AccessToken { .. } => {
            tracing::info!("Object storage configured with a static access token")
        }
    }

    let notifier: Arc<dyn Notifier> = match config.notifier {
        NotifierKind::Mailgun => {
            let creds: MailgunCredentials =
                secrets::load(source.as_ref(), &config.notifier_secret).await?;
            tracing::info!("Mailgun notifier configured for domain {}", creds.domain);
            Arc::new(MailgunNotifier::new(
                client,
                &config.mailgun_api_base,
                creds,
                &config.mail_subject,
            ))
        }
        NotifierKind::Smtp => {
            let creds: SmtpCredentials =
                secrets::load(source.as_ref(), &config.notifier_secret).await?;
            tracing::info!("SMTP notifier configured for {}:{}", creds.host, creds.port);
            Arc::new(SmtpNotifier::new(&creds, &config.mail_subject)?)
        }
    };

    let fetcher = HttpFetcher::new(config.fetch_allowed_hosts.clone(), config.timeouts.fetch)?;

    Ok(Pipeline::new(
        Arc::new(fetcher),
        BlobPublisher::new(Arc::new(store), &config.bucket),
        notifier,
        recorder,
        config.timeouts,
    ))
}

pub fn build_app(pipeline: Pipeline) -> Router {
    let state: SharedState = Arc::new(AppState { pipeline });

    Router::new()
        .merge(routes::event_routes())
        .route("/health", axum::routing::get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
