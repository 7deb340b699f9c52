//! Document storage (ticket PDFs, membership cards)
//!
//! Two backends behind the `Storage` trait: a directory on local disk and a
//! bucket-style HTTP object API (`POST/GET {url}/object/{bucket}/{path}`).

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::StorageConfig;
use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage request failed: {0}")]
    Network(String),

    #[error("Storage API error {0}: {1}")]
    Api(u16, String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => ApiError::NotFound(format!("Document {}", path)),
            StorageError::InvalidPath(path) => ApiError::bad_request(format!("Invalid path: {}", path)),
            StorageError::Io(e) => ApiError::Internal(format!("Storage IO error: {}", e)),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `bytes` under `path`, replacing any existing object.
    /// Returns the path that should be recorded in the database.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}

/// Build the configured storage backend
pub fn from_config(config: &StorageConfig) -> Result<Box<dyn Storage>, StorageError> {
    match config {
        StorageConfig::Local { root } => Ok(Box::new(LocalStorage::new(root.clone()))),
        StorageConfig::Http { url, bucket, api_key } => Ok(Box::new(HttpStorage::new(
            url.clone(),
            bucket.clone(),
            api_key.clone(),
        )?)),
    }
}

/// Relative object path with no `..`, no root and no empty segments
fn validate_path(path: &str) -> Result<&str, StorageError> {
    let trimmed = path.trim_start_matches('/');
    let valid = !trimmed.is_empty()
        && Path::new(trimmed)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

    if valid {
        Ok(trimmed)
    } else {
        Err(StorageError::InvalidPath(path.to_string()))
    }
}

/// Files under a root directory
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, StorageError> {
        let relative = validate_path(path)?;
        let full = self.root.join(relative);

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;

        debug!(path = %full.display(), "Stored document");
        Ok(relative.to_string())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let relative = validate_path(path)?;
        match tokio::fs::read(self.root.join(relative)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(relative.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Bucket storage over HTTP
pub struct HttpStorage {
    http_client: reqwest::Client,
    base_url: String,
    bucket: String,
    api_key: Option<String>,
}

impl HttpStorage {
    pub fn new(base_url: String, bucket: String, api_key: Option<String>) -> Result<Self, StorageError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StorageError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            bucket,
            api_key,
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/object/{}/{}", self.base_url, self.bucket, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl Storage for HttpStorage {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        let relative = validate_path(path)?;
        let url = self.object_url(relative);

        let response = self
            .authorize(self.http_client.post(&url))
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StorageError::Api(status.as_u16(), error_text));
        }

        debug!(url = %url, "Uploaded document");
        Ok(relative.to_string())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let relative = validate_path(path)?;
        let response = self
            .authorize(self.http_client.get(self.object_url(relative)))
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(relative.to_string()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StorageError::Api(status.as_u16(), error_text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
