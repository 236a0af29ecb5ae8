//! Blob storage for uploaded invoice images.

mod local;

pub use local::LocalStorage;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur in blob storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Only image payloads are accepted.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Underlying filesystem error.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for blob storage backends.
///
/// The rest of the system only depends on this four-operation contract; the
/// locator returned by `save` is opaque to callers.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Persist raw image bytes under `name` and return a locator for them.
    /// Rejects any content type not prefixed `image/`.
    async fn save(
        &self,
        name: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Fetch the bytes behind a locator.
    async fn get(&self, locator: &str) -> Result<Vec<u8>, StorageError>;

    /// Delete the blob behind a locator. Absence is not an error.
    async fn delete(&self, locator: &str) -> Result<(), StorageError>;

    /// Map a locator to an externally reachable URL.
    fn url_for(&self, locator: &str) -> String;
}
