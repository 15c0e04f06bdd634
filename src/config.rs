use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::ConfigError;

static TABLE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").unwrap());

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bucket: String,
    pub audit_table: String,
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub secrets: SecretsBackend,
    pub storage_secret: String,
    pub notifier_secret: String,
    pub notifier: NotifierKind,
    pub mailgun_api_base: String,
    pub gcs_api_base: String,
    pub mail_subject: String,
    pub fetch_allowed_hosts: Vec<String>,
    pub timeouts: StageTimeouts,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SecretsBackend {
    Env,
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NotifierKind {
    Mailgun,
    Smtp,
}

/// Upper bound on how long each stage may run before it is abandoned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTimeouts {
    pub fetch: Duration,
    pub publish: Duration,
    pub notify: Duration,
    pub record: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(30),
            publish: Duration::from_secs(60),
            notify: Duration::from_secs(30),
            record: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| ConfigError::Missing(key.to_string()));
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let database_url = required("DATABASE_URL")?;
        let bucket = required("GCS_BUCKET_NAME")?;

        let audit_table = required("AUDIT_TABLE_NAME")?;
        if !TABLE_NAME_RE.is_match(&audit_table) {
            return Err(ConfigError::invalid(
                "AUDIT_TABLE_NAME",
                format!("'{audit_table}' is not a plain SQL identifier"),
            ));
        }

        let host: IpAddr = or("RELAY_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| ConfigError::invalid("RELAY_HOST", e))?;

        let port: u16 = or("RELAY_PORT", "3000")
            .parse()
            .map_err(|e| ConfigError::invalid("RELAY_PORT", e))?;

        let secrets = match or("RELAY_SECRETS_BACKEND", "env").as_str() {
            "env" => SecretsBackend::Env,
            "file" => SecretsBackend::File(PathBuf::from(or("RELAY_SECRETS_DIR", "/run/secrets"))),
            other => {
                return Err(ConfigError::invalid(
                    "RELAY_SECRETS_BACKEND",
                    format!("expected 'env' or 'file', got '{other}'"),
                ));
            }
        };

        let notifier = match or("RELAY_NOTIFIER", "mailgun").as_str() {
            "mailgun" => NotifierKind::Mailgun,
            "smtp" => NotifierKind::Smtp,
            other => {
                return Err(ConfigError::invalid(
                    "RELAY_NOTIFIER",
                    format!("expected 'mailgun' or 'smtp', got '{other}'"),
                ));
            }
        };

        let fetch_allowed_hosts = or("FETCH_ALLOWED_HOSTS", "")
            .split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let defaults = StageTimeouts::default();
        let secs = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            match get(key) {
                Some(v) => {
                    let n: u64 = v.trim().parse().map_err(|e| ConfigError::invalid(key, e))?;
                    if n == 0 {
                        return Err(ConfigError::invalid(key, "must be greater than zero"));
                    }
                    Ok(Duration::from_secs(n))
                }
                None => Ok(default),
            }
        };
        let timeouts = StageTimeouts {
            fetch: secs("FETCH_TIMEOUT_SECS", defaults.fetch)?,
            publish: secs("PUBLISH_TIMEOUT_SECS", defaults.publish)?,
            notify: secs("NOTIFY_TIMEOUT_SECS", defaults.notify)?,
            record: secs("RECORD_TIMEOUT_SECS", defaults.record)?,
        };

        Ok(Config {
            database_url,
            bucket,
            audit_table,
            host,
            port,
            log_level: or("RELAY_LOG_LEVEL", "info"),
            secrets,
            storage_secret: or("STORAGE_SECRET_NAME", "GCP_SERVICE_ACCOUNT"),
            notifier_secret: or("NOTIFIER_SECRET_NAME", "MAILGUN_CREDENTIALS"),
            notifier,
            mailgun_api_base: or("MAILGUN_API_BASE", "https://api.mailgun.net"),
            gcs_api_base: or("GCS_API_BASE", "https://storage.googleapis.com"),
            mail_subject: or("MAIL_SUBJECT", "Your Assignment Submission"),
            fetch_allowed_hosts,
            timeouts,
        })
    }
}
