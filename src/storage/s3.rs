//! S3 backend
//!
//! Talks to Amazon S3 or any S3-compatible service (MinIO, R2, GCS
//! interoperability mode) through `aws-sdk-s3`.
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | PutObject | `s3.put_object` | bucket, key, bytes, etag |
//! | ListObjectsV2 | `s3.list_objects` | bucket, objects |
//! | Presigned GetObject | `s3.presign_get_object` | bucket, key, ttl |

use super::{ObjectStore, StorageError, StoredObject};
use crate::config::S3Config;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::DateTime;
use std::time::Duration;

/// S3-backed object store
pub struct S3Store {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3Store {
    /// Create a client for `bucket`
    ///
    /// Static keys from the config take precedence; otherwise the AWS default
    /// credential chain (env, profile, instance metadata) is used.
    pub async fn new(bucket: &str, config: &S3Config) -> Result<Self, StorageError> {
        if bucket.trim().is_empty() {
            return Err(StorageError::Config("S3 bucket name is empty".into()));
        }

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                loader = loader.credentials_provider(Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    "cloudshelf-config",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(StorageError::Config(
                    "access_key and secret_key must be set together".into(),
                ))
            }
        }

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: bucket.to_string(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.region))
    }

    async fn ensure_exists(&self, key: &str) -> Result<(), StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                    || is_http_404(&err);
                if not_found {
                    Err(StorageError::NotFound(key.to_string()))
                } else {
                    Err(StorageError::Sign(DisplayErrorContext(&err).to_string()))
                }
            }
        }
    }
}

fn is_http_404(err: &SdkError<HeadObjectError>) -> bool {
    err.raw_response()
        .map(|response| response.status().as_u16() == 404)
        .unwrap_or(false)
}

#[async_trait]
impl ObjectStore for S3Store {
    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, body),
        fields(
            s3.bucket = %self.bucket,
            s3.key = %key,
            upload.bytes = body.len(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::Write(DisplayErrorContext(&e).to_string()))?;

        if let Some(etag) = response.e_tag() {
            tracing::Span::current().record("s3.etag", etag);
        }

        Ok(())
    }

    #[tracing::instrument(
        name = "s3.list_objects",
        skip(self),
        fields(s3.bucket = %self.bucket, s3.objects = tracing::field::Empty),
        err
    )]
    async fn list(&self) -> Result<Vec<StoredObject>, StorageError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StorageError::List(DisplayErrorContext(&e).to_string()))?;

            for object in page.contents() {
                let Some(name) = object.key() else {
                    continue;
                };
                objects.push(StoredObject {
                    name: name.to_string(),
                    size: object.size().unwrap_or_default().max(0) as u64,
                    updated: object
                        .last_modified()
                        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
                    etag: object.e_tag().map(|tag| tag.trim_matches('"').to_string()),
                });
            }
        }

        tracing::Span::current().record("s3.objects", objects.len());
        Ok(objects)
    }

    #[tracing::instrument(
        name = "s3.presign_get_object",
        skip(self),
        fields(s3.bucket = %self.bucket, s3.key = %key, ttl_secs = ttl.as_secs())
    )]
    async fn sign_read_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        self.ensure_exists(key).await?;

        let presigning =
            PresigningConfig::expires_in(ttl).map_err(|e| StorageError::Sign(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Sign(DisplayErrorContext(&e).to_string()))?;

        Ok(request.uri().to_string())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: Option<&str>) -> S3Config {
        S3Config {
            region: "us-west-2".into(),
            endpoint: endpoint.map(Into::into),
            access_key: Some("test-access".into()),
            secret_key: Some("test-secret".into()),
            force_path_style: true,
        }
    }

    #[tokio::test]
    async fn test_default_endpoint() {
        let store = S3Store::new("test-bucket", &config(None)).await.unwrap();
        assert_eq!(store.bucket(), "test-bucket");
        assert_eq!(store.endpoint(), "https://s3.us-west-2.amazonaws.com");
    }

    #[tokio::test]
    async fn test_custom_endpoint() {
        let store = S3Store::new("test-bucket", &config(Some("http://localhost:9000")))
            .await
            .unwrap();
        assert_eq!(store.endpoint(), "http://localhost:9000");
    }

    #[tokio::test]
    async fn test_half_configured_keys_rejected() {
        let mut cfg = config(None);
        cfg.secret_key = None;
        assert!(matches!(
            S3Store::new("test-bucket", &cfg).await,
            Err(StorageError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_bucket_rejected() {
        assert!(S3Store::new("", &config(None)).await.is_err());
    }
}
