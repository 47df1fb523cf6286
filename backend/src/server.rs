use std::sync::Arc;

use aide::openapi::OpenApi;
use axum::{extract::DefaultBodyLimit, Extension, Router};
use datadog_tracing::axum::{shutdown_signal, OtelAxumLayer, OtelInResponseLayer};
use tokio::net::TcpListener;

use crate::routes;
use crate::{blob_storage::BlobStore, types::Environment};

/// Builds the application router with its dependencies attached
///
/// Request tracing and timeouts are added by [`start`]; tests drive this
/// router directly.
pub fn app(environment: Environment, blob_store: Arc<dyn BlobStore>) -> Router {
    let mut openapi = OpenApi::default();
    let max_upload_bytes = environment.max_upload_bytes();

    routes::handler(environment.show_api_docs())
        .finish_api(&mut openapi)
        .layer(Extension(openapi))
        .layer(Extension(environment))
        .layer(Extension(blob_store))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// Starts the server with the given environment and dependencies
///
/// # Errors
///
/// Returns an error if the server fails to start or bind to the port
pub async fn start(environment: Environment, blob_store: Arc<dyn BlobStore>) -> anyhow::Result<()> {
    let request_timeout = environment.request_timeout();

    let router = app(environment, blob_store)
        // Include trace context as header into the response
        .layer(OtelInResponseLayer)
        // Start OpenTelemetry trace on incoming request
        .layer(OtelAxumLayer::default())
        .layer(tower_http::timeout::TimeoutLayer::new(request_timeout));

    let addr = std::net::SocketAddr::from((
        [0, 0, 0, 0],
        std::env::var("PORT").map_or(Ok(8000), |p| p.parse())?,
    ));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🔄 Image Gallery started on http://{addr}");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(anyhow::Error::from)
}
