//! Google Cloud Storage backend
//!
//! Authenticates with a service account key and signs V4 download URLs with
//! the account's private key, the way Firebase Storage buckets expect.

use super::{ObjectStore, StorageError, StoredObject};
use crate::config::ServiceAccountKey;
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use hyper::Method;
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{
    Attribute, AttributeValue, Attributes, ClientOptions, Error as ObjectStoreError,
    ObjectStore as _, ObjectStoreExt as _, PutOptions, PutPayload,
};
use std::time::Duration;

/// GCS-backed object store
pub struct GcsStore {
    store: GoogleCloudStorage,
    bucket: String,
}

impl GcsStore {
    /// Build a client for `bucket` authenticated as `account`
    pub fn new(bucket: &str, account: &ServiceAccountKey) -> Result<Self, StorageError> {
        Self::with_endpoint(bucket, account, None)
    }

    /// Like [`GcsStore::new`], but talking to `endpoint` instead of
    /// `storage.googleapis.com`, e.g. a fake-gcs-server emulator.
    ///
    /// Plain `http://` endpoints are allowed.
    pub fn with_endpoint(
        bucket: &str,
        account: &ServiceAccountKey,
        endpoint: Option<&str>,
    ) -> Result<Self, StorageError> {
        let key_json = account
            .to_json()
            .map_err(|e| StorageError::Config(format!("Invalid service account: {}", e)))?;

        let mut builder = GoogleCloudStorageBuilder::new()
            .with_bucket_name(bucket)
            .with_service_account_key(key_json);

        if let Some(endpoint) = endpoint {
            builder = builder
                .with_base_url(endpoint.trim_end_matches('/'))
                .with_client_options(
                    ClientOptions::new().with_allow_http(endpoint.starts_with("http://")),
                );
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            store,
            bucket: bucket.to_string(),
        })
    }
}

/// Object location for `key`, taken verbatim.
///
/// `Path::from` would percent-encode characters such as `%`, `[` and `~`,
/// so the stored name would no longer match the listed one.
fn location(key: &str) -> Result<Path, object_store::path::Error> {
    Path::parse(key)
}

#[async_trait]
impl ObjectStore for GcsStore {
    #[tracing::instrument(
        name = "gcs.put_object",
        skip(self, body),
        fields(gcs.bucket = %self.bucket, gcs.key = %key, upload.bytes = body.len()),
        err
    )]
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        let location = location(key).map_err(|e| StorageError::Write(e.to_string()))?;

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(body), options)
            .await
            .map_err(|e| StorageError::Write(e.to_string()))?;

        Ok(())
    }

    #[tracing::instrument(
        name = "gcs.list_objects",
        skip(self),
        fields(gcs.bucket = %self.bucket),
        err
    )]
    async fn list(&self) -> Result<Vec<StoredObject>, StorageError> {
        let metas: Vec<_> = self
            .store
            .list(None)
            .try_collect()
            .await
            .map_err(|e| StorageError::List(e.to_string()))?;

        Ok(metas
            .into_iter()
            .map(|meta| StoredObject {
                name: meta.location.to_string(),
                size: meta.size,
                updated: Some(meta.last_modified),
                etag: meta.e_tag.map(|tag| tag.trim_matches('"').to_string()),
            })
            .collect())
    }

    #[tracing::instrument(
        name = "gcs.sign_read_url",
        skip(self),
        fields(gcs.bucket = %self.bucket, gcs.key = %key, ttl_secs = ttl.as_secs())
    )]
    async fn sign_read_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let location = location(key).map_err(|e| StorageError::Sign(e.to_string()))?;

        match self.store.head(&location).await {
            Ok(_) => {}
            Err(ObjectStoreError::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(StorageError::Sign(e.to_string())),
        }

        let url = self
            .store
            .signed_url(Method::GET, &location, ttl)
            .await
            .map_err(|e| StorageError::Sign(e.to_string()))?;

        Ok(url.to_string())
    }

    fn backend_name(&self) -> &'static str {
        "gcs"
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_keeps_key_verbatim() {
        for key in ["a%b.txt", "[draft] notes.txt", "x~y.txt", "report 2024.pdf"] {
            assert_eq!(location(key).unwrap().as_ref(), key);
        }
    }

    #[test]
    fn test_location_rejects_dot_segments() {
        assert!(location("..").is_err());
    }

    #[test]
    fn test_new_rejects_unparseable_private_key() {
        let account = ServiceAccountKey {
            private_key_id: "key-1".into(),
            private_key: "not a pem".into(),
            client_email: "uploader@example.iam.gserviceaccount.com".into(),
            ..Default::default()
        };
        assert!(matches!(
            GcsStore::new("bucket", &account),
            Err(StorageError::Config(_))
        ));
    }
}
