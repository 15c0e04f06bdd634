use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use super::BlobStore;
use crate::error::{ConfigError, PublishError, truncate_body};
use crate::secrets::StorageCredentials;

const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Google Cloud Storage writer using the JSON API media upload.
pub struct GcsStore {
    client: reqwest::Client,
    api_base: String,
    auth: TokenSource,
}

enum TokenSource {
    ServiceAccount {
        client_email: String,
        token_uri: String,
        key: EncodingKey,
    },
    Static(String),
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GcsStore {
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        credentials: &StorageCredentials,
    ) -> Result<Self, ConfigError> {
        let auth = match credentials {
            StorageCredentials::ServiceAccount(sa) => TokenSource::ServiceAccount {
                client_email: sa.client_email.clone(),
                token_uri: sa.token_uri.clone(),
                key: EncodingKey::from_rsa_pem(sa.private_key.as_bytes())
                    .map_err(|e| ConfigError::invalid("storage private_key", e))?,
            },
            StorageCredentials::AccessToken { access_token } => {
                TokenSource::Static(access_token.clone())
            }
        };

        let api_base: String = api_base.into();
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Obtain a bearer token. Service-account tokens are minted per call.
    async fn access_token(&self) -> Result<String, PublishError> {
        let (client_email, token_uri, key) = match &self.auth {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount {
                client_email,
                token_uri,
                key,
            } => (client_email, token_uri, key),
        };

        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: client_email,
            scope: STORAGE_SCOPE,
            aud: token_uri,
            iat: now,
            exp: now + 3600,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, key)
            .map_err(|e| PublishError::Auth(format!("JWT encode failed: {e}")))?;

        let resp = self
            .client
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| PublishError::Auth(format!("token request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Auth(format!(
                "token endpoint returned {status}: {}",
                truncate_body(&body)
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| PublishError::Auth(format!("invalid token response: {e}")))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl BlobStore for GcsStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), PublishError> {
        let token = self.access_token().await?;

        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.api_base,
            urlencoding::encode(bucket)
        );

        let resp = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", key)])
            .bearer_auth(token)
            .header("Content-Type", "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                status: status.to_string(),
                body: truncate_body(&body),
            });
        }

        Ok(())
    }
}
