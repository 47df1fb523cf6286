pub mod gallery;
mod health;
pub mod upload;

use aide::axum::{
    routing::{get, post},
    ApiRouter,
};

/// Creates the v1 API router with all v1 handler routes
pub fn handler() -> ApiRouter {
    ApiRouter::new()
        .api_route("/upload", post(upload::upload_image))
        .api_route("/gallery", get(gallery::list_gallery))
        .route("/health", axum::routing::get(health::handler))
}
