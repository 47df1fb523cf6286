//! Universal error handling for the API

use aide::OperationOutput;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use schemars::JsonSchema;
use serde::Serialize;

use crate::blob_storage::BlobError;

/// Error envelope returned by every JSON endpoint
#[derive(Debug, Serialize, JsonSchema)]
pub struct ApiErrorResponse {
    /// Always `false` for errors
    pub ok: bool,
    /// Human-readable error message
    pub error: &'static str,
}

/// Application error type that wraps the API error response
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    inner: ApiErrorResponse,
}

impl AppError {
    /// Create a new application error
    #[must_use]
    pub const fn new(status: StatusCode, msg: &'static str) -> Self {
        Self {
            status,
            inner: ApiErrorResponse {
                ok: false,
                error: msg,
            },
        }
    }

    /// Malformed or missing upload fields (400)
    #[must_use]
    pub const fn invalid_request(msg: &'static str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Declared content type is not an image (415)
    #[must_use]
    pub const fn unsupported_media_type() -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "only image/* allowed")
    }

    /// Upload body exceeds the configured limit (413)
    #[must_use]
    pub const fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "file too large")
    }

    /// Storage backend failure (500)
    #[must_use]
    pub const fn storage_unavailable() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable")
    }

    /// HTTP status of this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Message sent to the client
    #[must_use]
    pub const fn message(&self) -> &'static str {
        self.inner.error
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error based on status code
        match self.status.as_u16() {
            400..=499 => tracing::warn!("Client error: {} - {}", self.status, self.inner.error),
            500..=599 => tracing::error!("Server error: {} - {}", self.status, self.inner.error),
            _ => {}
        }

        (self.status, Json(self.inner)).into_response()
    }
}

/// Convert storage errors to application errors
///
/// Details are logged, never sent to the client.
impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        tracing::error!("Storage error: {err}");
        Self::storage_unavailable()
    }
}

/// Convert multipart parsing errors to application errors
impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        tracing::warn!("Multipart error: {}", err.body_text());
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::payload_too_large()
        } else {
            Self::invalid_request("invalid multipart body")
        }
    }
}

impl OperationOutput for AppError {
    type Inner = ApiErrorResponse;

    fn operation_response(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) -> Option<aide::openapi::Response> {
        Json::<ApiErrorResponse>::operation_response(ctx, operation)
    }
}
