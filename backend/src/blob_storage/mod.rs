//! Blob storage backends for uploaded images
mod azure;
mod error;
#[cfg(any(test, feature = "test-utils"))]
mod memory;
mod s3;

use async_trait::async_trait;
use axum::body::Bytes;

pub use azure::{AzureAuth, AzureBlobStore, ConnectionString, TokenCredential, TokenSource};
pub use error::{BlobError, BlobResult};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::InMemoryBlobStore;
pub use s3::S3BlobStore;

/// A single container of blobs in some object-storage provider
///
/// Implementations are bound to one container at construction and must be
/// safe to share across concurrent requests.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Base URL of the container, without a trailing slash
    fn container_url(&self) -> &str;

    /// Public URL of the object stored under `key`
    fn object_url(&self, key: &str) -> String {
        format!("{}/{key}", self.container_url())
    }

    /// Creates the container if it does not exist yet
    ///
    /// # Errors
    ///
    /// Returns `BlobError::ContainerExists` when the provider reports the
    /// container is already there, `BlobError::StorageUnavailable` otherwise
    async fn ensure_container(&self) -> BlobResult<()>;

    /// Uploads `bytes` under `key`, replacing any existing object
    ///
    /// Returns the public URL of the stored object.
    ///
    /// # Errors
    ///
    /// Returns `BlobError::StorageUnavailable` if the provider call fails
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> BlobResult<String>;

    /// Lists every object key currently in the container
    ///
    /// # Errors
    ///
    /// Returns `BlobError::StorageUnavailable` if the provider call fails
    async fn list(&self) -> BlobResult<Vec<String>>;
}

/// Creates the container at startup, treating "already exists" as success
///
/// # Errors
///
/// Propagates every other storage error
pub async fn ensure_container_exists(store: &dyn BlobStore) -> BlobResult<()> {
    match store.ensure_container().await {
        Ok(()) => {
            tracing::info!("Created container at {}", store.container_url());
            Ok(())
        }
        Err(BlobError::ContainerExists(detail)) => {
            tracing::debug!("Container already exists: {detail}");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
