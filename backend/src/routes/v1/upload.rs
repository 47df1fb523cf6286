use std::sync::Arc;

use axum::{Extension, Json};
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    blob_storage::BlobStore,
    naming,
    types::{AppError, ImageUpload},
};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UploadResponse {
    /// Always `true` on success
    pub ok: bool,
    /// Public URL of the stored image
    pub url: String,
}

/// Stores an uploaded image in the configured container
///
/// The multipart field `file` must carry a filename and an `image/*`
/// content type. The object is stored under
/// `<YYYYMMDDTHHMMSS>-<sanitized filename>`; two uploads with the same
/// sanitized name in the same second share a key and the later one wins.
///
/// # Errors
///
/// - 400 `missing file` / `empty filename` / `invalid multipart body`
/// - 413 `file too large` when the body exceeds the upload limit
/// - 415 `only image/* allowed`
/// - 500 `storage unavailable` if the storage backend call fails
#[instrument(skip(blob_store, upload), fields(filename = %upload.filename, content_type = %upload.content_type))]
pub async fn upload_image(
    Extension(blob_store): Extension<Arc<dyn BlobStore>>,
    upload: ImageUpload,
) -> Result<Json<UploadResponse>, AppError> {
    let key = naming::object_key(Utc::now(), &upload.filename);
    let size = upload.bytes.len();

    let url = blob_store
        .put(&key, upload.bytes, &upload.content_type)
        .await?;

    tracing::info!("Stored {key} ({size} bytes)");

    Ok(Json(UploadResponse { ok: true, url }))
}
