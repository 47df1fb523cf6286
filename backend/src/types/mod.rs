pub mod environment;
mod error;
mod extractors;

pub use environment::{Environment, StorageProvider};
pub use error::{ApiErrorResponse, AppError};
pub use extractors::{ImageUpload, FILE_FIELD};
