//! Object storage collaborator
//!
//! The handlers only ever talk to [`ObjectStore`]. Three implementations are
//! provided:
//!
//! | Backend | Type | Credentials |
//! |---------|------|-------------|
//! | Google Cloud Storage | [`GcsStore`] | service account key from config |
//! | S3 / S3-compatible | [`S3Store`] | static keys or the AWS default chain |
//! | In-process | [`MemoryStore`] | none, HMAC-signed links |
//!
//! # Example
//!
//! ```no_run
//! use cloudshelf::storage::{MemoryStore, ObjectStore};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new("demo");
//! store.put("a.txt", Bytes::from("hello"), "text/plain").await?;
//! let url = store.sign_read_url("a.txt", Duration::from_secs(60)).await?;
//! println!("{}", url);
//! # Ok(())
//! # }
//! ```

use crate::config::{StorageBackend, StorageConfig};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod gcs;
pub mod keys;
pub mod memory;
pub mod s3;

pub use gcs::GcsStore;
pub use memory::MemoryStore;
pub use s3::S3Store;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("List failed: {0}")]
    List(String),

    #[error("Signing failed: {0}")]
    Sign(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// One object as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub name: String,
    pub size: u64,
    pub updated: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// Storage collaborator interface
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`, replacing any existing object.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Every object in the bucket, in backend order.
    async fn list(&self) -> Result<Vec<StoredObject>, StorageError>;

    /// A read-only URL for `key` valid for `ttl`.
    ///
    /// Returns [`StorageError::NotFound`] when the object does not exist.
    async fn sign_read_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Short backend name for logs and metrics
    fn backend_name(&self) -> &'static str;
}

/// Build the configured backend
pub async fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        StorageBackend::Gcs => {
            let account = config.service_account.as_ref().ok_or_else(|| {
                StorageError::Config("gcs backend needs a service account".into())
            })?;
            Arc::new(GcsStore::new(&config.bucket, account)?)
        }
        StorageBackend::S3 => {
            let s3 = config.s3.clone().unwrap_or_default();
            Arc::new(S3Store::new(&config.bucket, &s3).await?)
        }
        StorageBackend::Memory => {
            let bucket = if config.bucket.is_empty() {
                "memory"
            } else {
                config.bucket.as_str()
            };
            Arc::new(MemoryStore::new(bucket))
        }
    };

    tracing::info!(
        backend = store.backend_name(),
        bucket = %config.bucket,
        "Object store initialized"
    );

    Ok(store)
}
