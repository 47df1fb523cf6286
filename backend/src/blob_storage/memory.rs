//! In-process blob store used by tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::Bytes;

use super::{BlobError, BlobResult, BlobStore};

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Object content
    pub bytes: Bytes,
    /// Content type recorded at upload
    pub content_type: String,
}

/// Blob store backed by a `HashMap`
///
/// Enumeration order is whatever the map yields, so callers cannot rely on
/// the backend for ordering.
pub struct InMemoryBlobStore {
    container_url: String,
    blobs: Mutex<HashMap<String, StoredBlob>>,
    created: AtomicBool,
    outage: AtomicBool,
}

impl InMemoryBlobStore {
    /// Creates an empty store whose objects live under `container_url`
    #[must_use]
    pub fn new(container_url: impl Into<String>) -> Self {
        Self {
            container_url: container_url.into().trim_end_matches('/').to_string(),
            blobs: Mutex::new(HashMap::new()),
            created: AtomicBool::new(false),
            outage: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent storage call fail while `down` is true
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Returns the object stored under `key`
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned
    #[must_use]
    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.blobs.lock().unwrap().get(key).cloned()
    }

    /// Number of stored objects
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    /// Whether the store holds no objects
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> BlobResult<()> {
        if self.outage.load(Ordering::SeqCst) {
            Err(BlobError::StorageUnavailable(
                "in-memory store is down".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> BlobResult<std::sync::MutexGuard<'_, HashMap<String, StoredBlob>>> {
        self.blobs
            .lock()
            .map_err(|e| BlobError::StorageUnavailable(e.to_string()))
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    fn container_url(&self) -> &str {
        &self.container_url
    }

    async fn ensure_container(&self) -> BlobResult<()> {
        self.check_available()?;
        if self.created.swap(true, Ordering::SeqCst) {
            return Err(BlobError::ContainerExists(self.container_url.clone()));
        }
        Ok(())
    }

    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> BlobResult<String> {
        self.check_available()?;
        self.lock()?.insert(
            key.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(self.object_url(key))
    }

    async fn list(&self) -> BlobResult<Vec<String>> {
        self.check_available()?;
        Ok(self.lock()?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_storage::ensure_container_exists;

    #[tokio::test]
    async fn test_put_overwrites_and_returns_url() {
        let store = InMemoryBlobStore::new("https://example.test/images/");

        let url = store
            .put("k.png", Bytes::from_static(b"first"), "image/png")
            .await
            .unwrap();
        assert_eq!(url, "https://example.test/images/k.png");

        store
            .put("k.png", Bytes::from_static(b"second"), "image/jpeg")
            .await
            .unwrap();

        let blob = store.get("k.png").unwrap();
        assert_eq!(blob.bytes, Bytes::from_static(b"second"));
        assert_eq!(blob.content_type, "image/jpeg");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_container_is_idempotent_at_startup() {
        let store = InMemoryBlobStore::new("https://example.test/images");

        assert!(store.ensure_container().await.is_ok());
        assert!(matches!(
            store.ensure_container().await,
            Err(BlobError::ContainerExists(_))
        ));

        // The startup helper swallows only the "exists" case
        assert!(ensure_container_exists(&store).await.is_ok());
    }

    #[tokio::test]
    async fn test_startup_surfaces_other_failures() {
        let store = InMemoryBlobStore::new("https://example.test/images");
        store.set_outage(true);

        assert!(matches!(
            ensure_container_exists(&store).await,
            Err(BlobError::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_outage_fails_every_call() {
        let store = InMemoryBlobStore::new("https://example.test/images");
        store.set_outage(true);

        assert!(store
            .put("a.png", Bytes::new(), "image/png")
            .await
            .is_err());
        assert!(store.list().await.is_err());

        store.set_outage(false);
        assert!(store.list().await.unwrap().is_empty());
    }
}
