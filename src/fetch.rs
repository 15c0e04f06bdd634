use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use reqwest::redirect::{Attempt, Policy};

use crate::error::{ConfigError, DownloadError};

const MAX_REDIRECTS: usize = 10;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url`. The returned body is never empty.
    async fn fetch(&self, url: &str) -> Result<Bytes, DownloadError>;
}

/// Downloads over HTTP(S). Every redirect hop is held to the same scheme and
/// host rules as the original URL.
pub struct HttpFetcher {
    client: reqwest::Client,
    allowed_hosts: Arc<Vec<String>>,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(allowed_hosts: Vec<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let allowed_hosts = Arc::new(allowed_hosts);
        let hops = allowed_hosts.clone();

        let client = reqwest::Client::builder()
            .user_agent(concat!("submission-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .redirect(Policy::custom(move |attempt| follow_checked(attempt, &hops)))
            .build()
            .map_err(|e| ConfigError::invalid("fetch client", e))?;

        Ok(Self {
            client,
            allowed_hosts,
            timeout,
        })
    }

    fn map_err(&self, err: reqwest::Error) -> DownloadError {
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            if let Some(refused) = cause.downcast_ref::<DownloadError>() {
                return refused.clone();
            }
            source = cause.source();
        }

        if err.is_timeout() {
            DownloadError::Timeout(self.timeout.as_secs())
        } else {
            DownloadError::Request(err.to_string())
        }
    }
}

fn follow_checked(attempt: Attempt, allowed_hosts: &[String]) -> reqwest::redirect::Action {
    if attempt.previous().len() >= MAX_REDIRECTS {
        return attempt.error(DownloadError::Request("too many redirects".to_string()));
    }
    match check_url(attempt.url(), allowed_hosts) {
        Ok(()) => attempt.follow(),
        Err(refused) => {
            tracing::warn!("Refusing redirect to {}: {refused}", attempt.url());
            attempt.error(refused)
        }
    }
}

fn parse_url(url: &str) -> Result<Url, DownloadError> {
    Url::parse(url).map_err(|e| DownloadError::InvalidUrl(format!("{url}: {e}")))
}

fn check_url(url: &Url, allowed_hosts: &[String]) -> Result<(), DownloadError> {
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(DownloadError::Blocked(format!("{other}:// URLs"))),
    }

    let host = url
        .host_str()
        .ok_or_else(|| DownloadError::InvalidUrl(format!("{url}: missing host")))?
        .to_ascii_lowercase();

    if !allowed_hosts.is_empty() && !allowed_hosts.iter().any(|h| *h == host) {
        return Err(DownloadError::Blocked(host));
    }

    Ok(())
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, DownloadError> {
        let url = parse_url(url)?;
        check_url(&url, &self.allowed_hosts)?;
        let host = url.host_str().unwrap_or_default().to_string();

        tracing::debug!("Downloading submission from {host}");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.to_string(),
            });
        }

        let body = resp.bytes().await.map_err(|e| self.map_err(e))?;
        if body.is_empty() {
            return Err(DownloadError::Empty);
        }

        tracing::debug!("Downloaded {} bytes from {host}", body.len());
        Ok(body)
    }
}
