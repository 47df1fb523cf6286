//! Custom extractors for request validation

use aide::operation::OperationInput;
use aide::OperationOutput;
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
};

use crate::types::error::AppError;

/// Multipart field carrying the uploaded image
pub const FILE_FIELD: &str = "file";

/// A validated image upload taken from a multipart form
///
/// The first field named `file` that carries a filename is the upload.
/// Validation happens in order: the field must exist, its filename must be
/// non-empty, and its declared content type must be `image/*`. The field body
/// is only read once all three checks pass.
#[derive(Debug)]
pub struct ImageUpload {
    /// Filename as sent by the client
    pub filename: String,
    /// MIME essence of the declared content type, e.g. `image/png`
    pub content_type: String,
    /// File content
    pub bytes: Bytes,
}

impl<S> FromRequest<S> for ImageUpload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state).await.map_err(|err| {
            tracing::warn!("Multipart rejection: {err}");
            AppError::invalid_request("invalid multipart body")
        })?;

        while let Some(field) = multipart.next_field().await? {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }

            // A `file` field without a filename is a plain form value
            let Some(filename) = field.file_name().map(ToString::to_string) else {
                continue;
            };

            if filename.is_empty() {
                return Err(AppError::invalid_request("empty filename"));
            }

            let content_type =
                image_content_type(field.content_type()).ok_or_else(AppError::unsupported_media_type)?;

            let bytes = field.bytes().await?;

            return Ok(Self {
                filename,
                content_type,
                bytes,
            });
        }

        Err(AppError::invalid_request("missing file"))
    }
}

/// Returns the content type to store if `declared` starts with `image/`
///
/// The gate is a plain prefix match. When the value also parses as a MIME
/// type its essence is kept, otherwise the trimmed lowercase value is.
fn image_content_type(declared: Option<&str>) -> Option<String> {
    let declared = declared?.trim().to_ascii_lowercase();
    if !declared.starts_with("image/") {
        return None;
    }

    Some(match declared.parse::<mime::Mime>() {
        Ok(parsed) if parsed.type_() == mime::IMAGE => parsed.essence_str().to_string(),
        _ => declared,
    })
}

impl OperationInput for ImageUpload {
    fn operation_input(ctx: &mut aide::generate::GenContext, operation: &mut aide::openapi::Operation) {
        // Same wire format as a raw multipart form
        Multipart::operation_input(ctx, operation);
    }

    fn inferred_early_responses(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) -> Vec<(Option<u16>, aide::openapi::Response)> {
        AppError::inferred_responses(ctx, operation)
    }
}
