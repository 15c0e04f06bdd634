//! Named secrets and the typed credentials decoded from them.
//!
//! Secrets are JSON documents. They are resolved once at startup and the
//! resulting credentials are handed to the provider clients.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::SecretsBackend;
use crate::error::ConfigError;

#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<serde_json::Value, ConfigError>;
}

/// Secret `name` is the JSON value of the environment variable `name`.
pub struct EnvSecretSource;

#[async_trait]
impl SecretSource for EnvSecretSource {
    async fn get_secret(&self, name: &str) -> Result<serde_json::Value, ConfigError> {
        let raw = std::env::var(name).map_err(|_| ConfigError::secret(name, "not set"))?;
        parse_secret(name, &raw)
    }
}

/// Secret `name` is the JSON content of `{dir}/{name}`.
pub struct FileSecretSource {
    dir: PathBuf,
}

impl FileSecretSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SecretSource for FileSecretSource {
    async fn get_secret(&self, name: &str) -> Result<serde_json::Value, ConfigError> {
        if name.contains('/') || name.contains('\\') || name == ".." {
            return Err(ConfigError::secret(name, "secret names may not contain path separators"));
        }
        let path = self.dir.join(name);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ConfigError::secret(name, format!("{}: {e}", path.display())))?;
        parse_secret(name, &raw)
    }
}

pub fn source_for(backend: &SecretsBackend) -> Box<dyn SecretSource> {
    match backend {
        SecretsBackend::Env => Box::new(EnvSecretSource),
        SecretsBackend::File(dir) => Box::new(FileSecretSource::new(dir.clone())),
    }
}

fn parse_secret(name: &str, raw: &str) -> Result<serde_json::Value, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::secret(name, format!("invalid JSON: {e}")))
}

/// Fetch secret `name` and decode it into `T`, rejecting blank string fields.
pub async fn load<T>(source: &dyn SecretSource, name: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Validate,
{
    let value = source.get_secret(name).await?;
    let creds: T = serde_json::from_value(value).map_err(|e| ConfigError::secret(name, e))?;
    creds.validate().map_err(|field| ConfigError::secret(name, format!("{field} is empty")))?;
    Ok(creds)
}

pub trait Validate {
    /// Returns the name of the first blank field.
    fn validate(&self) -> Result<(), &'static str>;
}

fn non_empty(value: &str, field: &'static str) -> Result<(), &'static str> {
    if value.trim().is_empty() { Err(field) } else { Ok(()) }
}

/// Object storage credentials.
#[derive(Clone, Deserialize)]
#[serde(untagged)]
pub enum StorageCredentials {
    ServiceAccount(ServiceAccountKey),
    AccessToken { access_token: String },
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl Validate for StorageCredentials {
    fn validate(&self) -> Result<(), &'static str> {
        match self {
            StorageCredentials::ServiceAccount(key) => {
                non_empty(&key.client_email, "client_email")?;
                non_empty(&key.private_key, "private_key")?;
                non_empty(&key.token_uri, "token_uri")
            }
            StorageCredentials::AccessToken { access_token } => {
                non_empty(access_token, "access_token")
            }
        }
    }
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageCredentials::ServiceAccount(key) => f
                .debug_struct("ServiceAccount")
                .field("client_email", &key.client_email)
                .finish_non_exhaustive(),
            StorageCredentials::AccessToken { .. } => f.write_str("AccessToken"),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailgunCredentials {
    pub api_key: String,
    pub domain: String,
    pub from_email: String,
}

impl Validate for MailgunCredentials {
    fn validate(&self) -> Result<(), &'static str> {
        non_empty(&self.api_key, "apiKey")?;
        non_empty(&self.domain, "domain")?;
        non_empty(&self.from_email, "fromEmail")
    }
}

#[derive(Clone, Deserialize)]
pub struct SmtpCredentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Validate for SmtpCredentials {
    fn validate(&self) -> Result<(), &'static str> {
        non_empty(&self.host, "host")?;
        non_empty(&self.user, "user")?;
        non_empty(&self.pass, "pass")?;
        non_empty(&self.from, "from")
    }
}
