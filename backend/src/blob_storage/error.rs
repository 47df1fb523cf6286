//! Error types for blob storage operations

use aws_sdk_s3::{
    error::SdkError,
    operation::{
        create_bucket::CreateBucketError, list_objects_v2::ListObjectsV2Error,
        put_object::PutObjectError,
    },
};
use thiserror::Error;

/// Result type for blob storage operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob storage operations
#[derive(Error, Debug)]
pub enum BlobError {
    /// The container already exists (only reported by `ensure_container`)
    #[error("Container already exists: {0}")]
    ContainerExists(String),

    /// Network, auth or provider failure
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Invalid storage configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for BlobError {
    fn from(error: reqwest::Error) -> Self {
        Self::StorageUnavailable(error.to_string())
    }
}

impl From<SdkError<CreateBucketError>> for BlobError {
    fn from(error: SdkError<CreateBucketError>) -> Self {
        match error {
            SdkError::ServiceError(err) => match err.err() {
                CreateBucketError::BucketAlreadyOwnedByYou(_)
                | CreateBucketError::BucketAlreadyExists(_) => {
                    Self::ContainerExists(format!("{:?}", err.err()))
                }
                _ => Self::StorageUnavailable(format!("{:?}", err.err())),
            },
            _ => Self::StorageUnavailable(error.to_string()),
        }
    }
}

impl From<SdkError<PutObjectError>> for BlobError {
    fn from(error: SdkError<PutObjectError>) -> Self {
        Self::StorageUnavailable(error.to_string())
    }
}

impl From<SdkError<ListObjectsV2Error>> for BlobError {
    fn from(error: SdkError<ListObjectsV2Error>) -> Self {
        Self::StorageUnavailable(error.to_string())
    }
}
