//! S3-backed session history.
//!
//! A session's messages live in one JSON object at
//! `s3://<bucket>/<prefix>session_<id>/messages.json`, rewritten after every
//! successful turn. A missing object is a new session.

use std::sync::Arc;

use async_trait::async_trait;
use chatrelay_aws::{AwsAuth, Credentials, uri_encode};
use chatrelay_core::error::SessionError;
use chatrelay_core::history::HistoryStore;
use chatrelay_core::message::Message;
use tracing::debug;

use crate::window::trim_to_exchanges;

const SERVICE: &str = "s3";

/// Object key for a session's history.
pub fn session_key(prefix: &str, session_id: &str) -> String {
    format!("{prefix}session_{session_id}/messages.json")
}

/// Minimal object storage: whole-object get and put.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object; `Ok(None)` when it does not exist.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, SessionError>;

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), SessionError>;
}

/// S3 `GetObject` / `PutObject` over path-style URLs.
pub struct S3Client {
    region: String,
    endpoint: String,
    auth: AwsAuth,
    client: reqwest::Client,
}

impl S3Client {
    /// S3 only accepts SigV4, so access keys are required.
    pub fn new(region: impl Into<String>, credentials: Credentials) -> Result<Self, SessionError> {
        let region = region.into();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| SessionError::Storage(format!("HTTP client: {e}")))?;
        Ok(Self {
            endpoint: format!("https://s3.{region}.amazonaws.com"),
            region,
            auth: AwsAuth::SigV4(credentials),
            client,
        })
    }

    /// Build from configuration; `None` without access keys.
    pub fn from_config(config: &chatrelay_config::AppConfig) -> Result<Option<Self>, SessionError> {
        let aws = &config.aws;
        let Some(credentials) = Credentials::from_parts(
            aws.access_key_id.as_deref(),
            aws.secret_access_key.as_deref(),
            aws.session_token.as_deref(),
        ) else {
            return Ok(None);
        };

        let mut client = Self::new(&aws.region, credentials)?;
        if let Some(endpoint) = &aws.s3_endpoint {
            client = client.with_endpoint(endpoint);
        }
        Ok(Some(client))
    }

    /// Use a custom endpoint (e.g., an S3-compatible local server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<reqwest::Url, SessionError> {
        let url = format!(
            "{}/{}/{}",
            self.endpoint,
            uri_encode(bucket, true),
            uri_encode(key, false)
        );
        reqwest::Url::parse(&url).map_err(|e| SessionError::Storage(format!("{url}: {e}")))
    }

    async fn send(
        &self,
        method: reqwest::Method,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response, SessionError> {
        let url = self.object_url(bucket, key)?;
        let mut request = chatrelay_aws::authorized_request(
            &self.client,
            method,
            url,
            body,
            &self.auth,
            &self.region,
            SERVICE,
        )
        .map_err(|e| SessionError::Storage(e.to_string()))?;
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }
        request
            .send()
            .await
            .map_err(|e| SessionError::Storage(format!("s3://{bucket}/{key}: {e}")))
    }
}

async fn status_error(response: reqwest::Response, bucket: &str, key: &str) -> SessionError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    SessionError::Storage(format!("s3://{bucket}/{key} returned {status}: {body}"))
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, SessionError> {
        let response = self
            .send(reqwest::Method::GET, bucket, key, Vec::new(), None)
            .await?;
        match response.status().as_u16() {
            200 => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| SessionError::Storage(e.to_string()))?;
                Ok(Some(bytes.to_vec()))
            }
            404 => Ok(None),
            _ => Err(status_error(response, bucket, key).await),
        }
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), SessionError> {
        let response = self
            .send(reqwest::Method::PUT, bucket, key, body, Some(content_type))
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response, bucket, key).await)
        }
    }
}

/// History for one session, persisted in S3.
pub struct S3SessionStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    context_window: Option<usize>,
}

impl S3SessionStore {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        prefix: &str,
        session_id: &str,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            key: session_key(prefix, session_id),
            context_window: None,
        }
    }

    /// Show the model only the last `window_size` exchanges. The stored
    /// object still keeps the whole session.
    pub fn with_context_window(mut self, window_size: usize) -> Self {
        self.context_window = Some(window_size);
        self
    }

    pub fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    async fn load_all(&self) -> Result<Vec<Message>, SessionError> {
        match self.store.get(&self.bucket, &self.key).await? {
            None => Ok(Vec::new()),
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| SessionError::Corrupt {
                key: self.location(),
                reason: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl HistoryStore for S3SessionStore {
    fn name(&self) -> &str {
        "s3"
    }

    fn is_persistent(&self) -> bool {
        true
    }

    async fn load(&self) -> Result<Vec<Message>, SessionError> {
        let messages = self.load_all().await?;
        debug!(location = %self.location(), messages = messages.len(), "Loaded session history");
        Ok(match self.context_window {
            Some(window) => trim_to_exchanges(&messages, window).to_vec(),
            None => messages,
        })
    }

    async fn save(&self, messages: &[Message]) -> Result<(), SessionError> {
        // `messages` may be a trimmed view; stitch it back onto the stored
        // prefix the model did not see.
        let full = match self.context_window {
            Some(window) => {
                let stored = self.load_all().await?;
                let shown = trim_to_exchanges(&stored, window).len();
                let mut full = stored[..stored.len() - shown].to_vec();
                full.extend_from_slice(messages);
                full
            }
            None => messages.to_vec(),
        };

        let body = serde_json::to_vec(&full).map_err(|e| SessionError::Storage(e.to_string()))?;
        self.store
            .put(&self.bucket, &self.key, body, "application/json")
            .await?;
        debug!(location = %self.location(), messages = full.len(), "Saved session history");
        Ok(())
    }
}
