use std::sync::Arc;

use axum::{Extension, Json};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{blob_storage::BlobStore, types::AppError};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GalleryResponse {
    /// Always `true` on success
    pub ok: bool,
    /// Public URLs of every stored image, newest key first
    pub gallery: Vec<String>,
}

/// Lists every stored image as a public URL
///
/// URLs are sorted in descending lexicographic order, which puts the most
/// recent timestamp prefixes first whatever order the backend enumerates in.
#[instrument(skip(blob_store))]
pub async fn list_gallery(
    Extension(blob_store): Extension<Arc<dyn BlobStore>>,
) -> Result<Json<GalleryResponse>, AppError> {
    let mut gallery: Vec<String> = blob_store
        .list()
        .await?
        .iter()
        .map(|key| blob_store.object_url(key))
        .collect();
    gallery.sort_unstable_by(|a, b| b.cmp(a));

    tracing::debug!("Listed {} images", gallery.len());

    Ok(Json(GalleryResponse { ok: true, gallery }))
}
