//! Environment configuration for different deployment stages

use std::env;
use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion};
use tracing::Level;

/// Default Azure storage account used when no connection string is set
pub const DEFAULT_STORAGE_ACCOUNT_URL: &str = "https://yex8wbsystems.blob.core.windows.net";

/// Default container holding uploaded images
pub const DEFAULT_IMAGES_CONTAINER: &str = "lanternfly-images";

/// Default multipart body limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Object storage provider backing the gallery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageProvider {
    /// Azure Blob Storage
    Azure,
    /// AWS S3
    S3,
}

/// Application environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (Azurite / `LocalStack`)
    Development,
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => Self::Development,
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Storage provider selected by `STORAGE_PROVIDER` (defaults to Azure)
    ///
    /// # Panics
    ///
    /// Panics if `STORAGE_PROVIDER` contains an invalid value
    #[must_use]
    pub fn storage_provider(&self) -> StorageProvider {
        let provider = env::var("STORAGE_PROVIDER")
            .unwrap_or_else(|_| "azure".to_string())
            .trim()
            .to_lowercase();

        match provider.as_str() {
            "azure" => StorageProvider::Azure,
            "s3" => StorageProvider::S3,
            _ => panic!("Invalid storage provider: {provider}"),
        }
    }

    /// Returns the container (or bucket) name holding uploaded images
    #[must_use]
    pub fn images_container(&self) -> String {
        env::var("IMAGES_CONTAINER").unwrap_or_else(|_| DEFAULT_IMAGES_CONTAINER.to_string())
    }

    /// Azure connection string, if one is configured
    #[must_use]
    pub fn azure_connection_string(&self) -> Option<String> {
        env::var("AZURE_STORAGE_CONNECTION_STRING")
            .ok()
            .filter(|s| !s.trim().is_empty())
    }

    /// Azure storage account URL used with managed identity
    #[must_use]
    pub fn storage_account_url(&self) -> String {
        env::var("STORAGE_ACCOUNT_URL").unwrap_or_else(|_| DEFAULT_STORAGE_ACCOUNT_URL.to_string())
    }

    /// Whether to show API docs
    #[must_use]
    pub const fn show_api_docs(&self) -> bool {
        matches!(self, Self::Development | Self::Staging)
    }

    /// Maximum accepted request body size for uploads
    #[must_use]
    pub fn max_upload_bytes(&self) -> usize {
        env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES)
    }

    /// Per-request timeout
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        let secs = env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Returns the endpoint URL to use for AWS services
    #[must_use]
    pub const fn override_aws_endpoint_url(&self) -> Option<&str> {
        match self {
            // Regular AWS endpoints for production and staging
            Self::Production | Self::Staging => None,
            // LocalStack endpoint for development
            Self::Development => Some("http://localhost:4566"),
        }
    }

    /// AWS configuration with retry and timeout settings
    pub async fn aws_config(&self) -> aws_config::SdkConfig {
        let retry_config = RetryConfig::standard()
            .with_max_attempts(3)
            .with_initial_backoff(Duration::from_millis(50));

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(30))
            .build();

        let mut config_builder = aws_config::load_defaults(BehaviorVersion::latest())
            .await
            .to_builder()
            .retry_config(retry_config)
            .timeout_config(timeout_config);

        if let Some(endpoint_url) = self.override_aws_endpoint_url() {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }

        config_builder.build()
    }

    /// AWS S3 service configuration
    pub async fn s3_client_config(&self) -> aws_sdk_s3::Config {
        let aws_config = self.aws_config().await;
        let s3_config: aws_sdk_s3::Config = (&aws_config).into();
        let mut builder = s3_config.to_builder();

        // Override "force path style" to true for compatibility with LocalStack
        // https://github.com/awslabs/aws-sdk-rust/discussions/874
        if matches!(self, Self::Development) {
            builder.set_force_path_style(Some(true));
        }

        builder.build()
    }

    /// Base URL S3 objects are served from
    #[must_use]
    pub fn s3_public_base_url(&self, bucket: &str) -> String {
        if let Ok(url) = env::var("S3_PUBLIC_BASE_URL") {
            return url;
        }

        match self.override_aws_endpoint_url() {
            Some(endpoint) => format!("{endpoint}/{bucket}"),
            None => format!("https://{bucket}.s3.amazonaws.com"),
        }
    }

    /// Default log level when `RUST_LOG` is not set
    #[must_use]
    pub fn tracing_level(&self) -> Level {
        env::var("TRACING_LEVEL")
            .ok()
            .and_then(|val| val.parse::<Level>().ok())
            .unwrap_or(match self {
                Self::Production | Self::Staging => Level::INFO,
                Self::Development => Level::DEBUG,
            })
    }
}
