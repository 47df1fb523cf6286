//! S3-backed blob store

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::{
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client as S3Client,
};
use axum::body::Bytes;

use super::{BlobResult, BlobStore};

/// Blob store for a single S3 bucket
pub struct S3BlobStore {
    s3_client: Arc<S3Client>,
    bucket_name: String,
    public_base_url: String,
}

impl S3BlobStore {
    /// Creates a new S3 blob store
    ///
    /// # Arguments
    ///
    /// * `s3_client` - Pre-configured S3 client
    /// * `bucket_name` - Bucket holding the images
    /// * `public_base_url` - URL objects are served from, without the key
    #[must_use]
    pub fn new(s3_client: Arc<S3Client>, bucket_name: String, public_base_url: &str) -> Self {
        Self {
            s3_client,
            bucket_name,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn container_url(&self) -> &str {
        &self.public_base_url
    }

    async fn ensure_container(&self) -> BlobResult<()> {
        let mut request = self.s3_client.create_bucket().bucket(&self.bucket_name);

        // us-east-1 rejects an explicit location constraint
        if let Some(region) = self.s3_client.config().region() {
            if region.as_ref() != "us-east-1" {
                request = request.create_bucket_configuration(
                    CreateBucketConfiguration::builder()
                        .location_constraint(BucketLocationConstraint::from(region.as_ref()))
                        .build(),
                );
            }
        }

        request.send().await?;
        Ok(())
    }

    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> BlobResult<String> {
        let size = bytes.len();
        self.s3_client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await?;

        tracing::debug!("Uploaded object {key} ({size} bytes, {content_type})");
        Ok(self.object_url(key))
    }

    async fn list(&self) -> BlobResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pages = self
            .s3_client
            .list_objects_v2()
            .bucket(&self.bucket_name)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            keys.extend(
                page?
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(ToString::to_string)),
            );
        }

        Ok(keys)
    }
}
