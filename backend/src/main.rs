use std::sync::Arc;

use anyhow::Context;
use aws_sdk_s3::Client as S3Client;
use gallery_backend::{
    blob_storage::{ensure_container_exists, AzureBlobStore, BlobStore, S3BlobStore},
    server,
    types::{Environment, StorageProvider},
};
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(environment.tracing_level()).into())
        .from_env_lossy();

    // Configure logging format based on environment
    // Use JSON format for staging/production, regular format for development
    match environment {
        Environment::Production | Environment::Staging => {
            fmt().json().with_env_filter(filter).init();
        }
        Environment::Development => {
            fmt().with_env_filter(filter).init();
        }
    }

    tracing::info!("Starting Image Gallery in {:?} environment", environment);

    let blob_store = blob_store(&environment).await?;
    ensure_container_exists(blob_store.as_ref())
        .await
        .context("Failed to create images container")?;

    tracing::info!("✅ Container ready at {}", blob_store.container_url());

    server::start(environment, blob_store).await
}

/// Resolves credentials and builds the configured storage backend
async fn blob_store(environment: &Environment) -> anyhow::Result<Arc<dyn BlobStore>> {
    let container = environment.images_container();

    match environment.storage_provider() {
        StorageProvider::Azure => {
            let client = reqwest::Client::new();
            let store = if let Some(connection_string) = environment.azure_connection_string() {
                AzureBlobStore::from_connection_string(client, &connection_string, container)?
            } else {
                AzureBlobStore::with_token_credential(
                    client,
                    &environment.storage_account_url(),
                    container,
                )?
            };
            Ok(Arc::new(store))
        }
        StorageProvider::S3 => {
            let s3_client = Arc::new(S3Client::from_conf(environment.s3_client_config().await));
            let public_base_url = environment.s3_public_base_url(&container);
            Ok(Arc::new(S3BlobStore::new(
                s3_client,
                container,
                &public_base_url,
            )))
        }
    }
}
