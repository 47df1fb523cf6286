//! Image gallery backend: uploads images to blob storage and lists them back

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

/// Blob storage backends
pub mod blob_storage;

/// Object naming for uploads
pub mod naming;

/// HTTP routes
pub mod routes;

/// Server setup
pub mod server;

/// Configuration, errors and extractors
pub mod types;
