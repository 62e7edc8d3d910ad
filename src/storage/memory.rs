//! In-process object store
//!
//! Keeps objects in a `BTreeMap`, so listings come back in key order like the
//! cloud backends. Download links use a private `memory://` scheme signed with
//! HMAC-SHA256; [`MemoryStore::fetch_signed`] plays the part of the storage
//! service that would serve them.

use super::keys::{decode_key, encode_key};
use super::{ObjectStore, StorageError, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "memory://";

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: String,
    updated: DateTime<Utc>,
    etag: String,
}

/// Object store held entirely in memory
pub struct MemoryStore {
    bucket: String,
    signing_key: [u8; 32],
    objects: RwLock<BTreeMap<String, MemoryObject>>,
}

impl MemoryStore {
    /// Create an empty store with a fresh signing key
    pub fn new(bucket: impl Into<String>) -> Self {
        let mut signing_key = [0u8; 32];
        signing_key[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
        signing_key[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());

        Self {
            bucket: bucket.into(),
            signing_key,
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Raw bytes of an object, bypassing signing
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).map(|o| o.data.clone())
    }

    /// Stored content type of an object
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.read().get(key).map(|o| o.content_type.clone())
    }

    /// Resolve a URL produced by [`ObjectStore::sign_read_url`] to the object bytes.
    ///
    /// Fails with [`StorageError::Sign`] on a foreign, tampered or expired URL
    /// and with [`StorageError::NotFound`] if the object has since disappeared.
    pub fn fetch_signed(&self, url: &str) -> Result<Bytes, StorageError> {
        let rest = url
            .strip_prefix(SCHEME)
            .ok_or_else(|| StorageError::Sign(format!("Not a memory URL: {}", url)))?;
        let (path, query) = rest
            .split_once('?')
            .ok_or_else(|| StorageError::Sign("Missing signature".into()))?;
        let (bucket, encoded_key) = path
            .split_once('/')
            .ok_or_else(|| StorageError::Sign("Missing object key".into()))?;

        if bucket != self.bucket {
            return Err(StorageError::Sign(format!("Foreign bucket: {}", bucket)));
        }

        let key = decode_key(encoded_key)
            .ok_or_else(|| StorageError::Sign("Malformed object key".into()))?;

        let params: HashMap<&str, &str> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .collect();

        let expires: i64 = params
            .get("expires")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| StorageError::Sign("Missing expiry".into()))?;
        let signature = params
            .get("signature")
            .and_then(|v| hex::decode(v).ok())
            .ok_or_else(|| StorageError::Sign("Missing signature".into()))?;

        let mut mac = self.mac()?;
        mac.update(Self::string_to_sign(&self.bucket, &key, expires).as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| StorageError::Sign("Signature mismatch".into()))?;

        if Utc::now().timestamp() > expires {
            return Err(StorageError::Sign("Link expired".into()));
        }

        self.get(&key).ok_or(StorageError::NotFound(key))
    }

    fn mac(&self) -> Result<HmacSha256, StorageError> {
        HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| StorageError::Sign(e.to_string()))
    }

    fn string_to_sign(bucket: &str, key: &str, expires: i64) -> String {
        format!("GET\n{}\n{}\n{}", bucket, key, expires)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    #[tracing::instrument(
        name = "memory.put",
        skip(self, body),
        fields(key = %key, bytes = body.len())
    )]
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        let etag = hex::encode(Sha256::digest(&body));
        let object = MemoryObject {
            data: body,
            content_type: content_type.to_string(),
            updated: Utc::now(),
            etag,
        };
        self.objects.write().insert(key.to_string(), object);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StoredObject>, StorageError> {
        let objects = self.objects.read();
        Ok(objects
            .iter()
            .map(|(name, object)| StoredObject {
                name: name.clone(),
                size: object.data.len() as u64,
                updated: Some(object.updated),
                etag: Some(object.etag.clone()),
            })
            .collect())
    }

    #[tracing::instrument(name = "memory.sign_read_url", skip(self), fields(key = %key))]
    async fn sign_read_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        if !self.objects.read().contains_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| StorageError::Sign("TTL out of range".into()))?;
        let expires = Utc::now().timestamp() + ttl_secs;

        let mut mac = self.mac()?;
        mac.update(Self::string_to_sign(&self.bucket, key, expires).as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!(
            "{}{}/{}?expires={}&signature={}",
            SCHEME,
            self.bucket,
            encode_key(key),
            expires,
            signature
        ))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_list() {
        let store = MemoryStore::new("test");
        store.put("b.txt", Bytes::from("bb"), "text/plain").await.unwrap();
        store.put("a.txt", Bytes::from("a"), "text/plain").await.unwrap();

        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_put_overwrites_same_key() {
        let store = MemoryStore::new("test");
        store.put("a.txt", Bytes::from("old"), "text/plain").await.unwrap();
        store.put("a.txt", Bytes::from("new!"), "text/markdown").await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a.txt").unwrap(), Bytes::from("new!"));
        assert_eq!(store.content_type("a.txt").as_deref(), Some("text/markdown"));
    }

    #[tokio::test]
    async fn test_signed_url_round_trip() {
        let store = MemoryStore::new("test");
        store.put("my file.txt", Bytes::from("hello"), "text/plain").await.unwrap();

        let url = store
            .sign_read_url("my file.txt", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("memory://test/my%20file.txt?"));
        assert_eq!(store.fetch_signed(&url).unwrap(), Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_sign_missing_object_is_not_found() {
        let store = MemoryStore::new("test");
        let result = store.sign_read_url("nope", Duration::from_secs(60)).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_tampered_url_is_rejected() {
        let store = MemoryStore::new("test");
        store.put("a.txt", Bytes::from("a"), "text/plain").await.unwrap();
        store.put("b.txt", Bytes::from("b"), "text/plain").await.unwrap();

        let url = store.sign_read_url("a.txt", Duration::from_secs(60)).await.unwrap();
        let forged = url.replace("/a.txt?", "/b.txt?");
        assert!(matches!(store.fetch_signed(&forged), Err(StorageError::Sign(_))));
    }

    #[tokio::test]
    async fn test_url_from_other_store_is_rejected() {
        let first = MemoryStore::new("test");
        let second = MemoryStore::new("test");
        first.put("a.txt", Bytes::from("a"), "text/plain").await.unwrap();
        second.put("a.txt", Bytes::from("a"), "text/plain").await.unwrap();

        let url = first.sign_read_url("a.txt", Duration::from_secs(60)).await.unwrap();
        assert!(second.fetch_signed(&url).is_err());
    }
}
