use std::sync::Arc;

use axum::{body::Body, http::Request, response::Response, Router};
use gallery_backend::{blob_storage::InMemoryBlobStore, server, types::Environment};
use tower::ServiceExt;

use super::utils::{multipart_body, FormPart, BOUNDARY};

/// Container URL every test store serves objects from
pub const CONTAINER_URL: &str = "https://gallery.test/lanternfly-images";

/// Setup test environment variables with all the required configuration
pub fn setup_test_env() {
    // Load test environment variables
    dotenvy::from_path(".env.example").ok();

    // Initialize tracing for tests
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
}

/// Router wired to an in-memory blob store
pub struct TestSetup {
    pub router: Router,
    pub environment: Environment,
    pub blob_store: Arc<InMemoryBlobStore>,
}

impl TestSetup {
    pub fn new() -> Self {
        Self::with_environment(Environment::Development)
    }

    pub fn with_environment(environment: Environment) -> Self {
        setup_test_env();

        let blob_store = Arc::new(InMemoryBlobStore::new(CONTAINER_URL));
        let router = server::app(environment.clone(), blob_store.clone());

        Self {
            router,
            environment,
            blob_store,
        }
    }

    pub async fn send_get_request(
        &self,
        route: &str,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let request = Request::builder()
            .uri(route)
            .method("GET")
            .body(Body::empty())?;
        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }

    pub async fn send_upload_request(
        &self,
        parts: &[FormPart<'_>],
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let request = Request::builder()
            .uri("/api/v1/upload")
            .method("POST")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))?;

        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }

    pub async fn send_raw_post(
        &self,
        route: &str,
        content_type: &str,
        body: impl Into<Body>,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let request = Request::builder()
            .uri(route)
            .method("POST")
            .header("Content-Type", content_type)
            .body(body.into())?;

        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }
}
