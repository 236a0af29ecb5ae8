//! Local-filesystem blob storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{FileStorage, StorageError};

/// Blob storage backed by a directory on local disk.
///
/// Locators are the full file path; URLs point at the server's `/uploads`
/// static route.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create the storage, creating the upload directory if needed.
    pub fn new(base_path: impl Into<PathBuf>, base_url: &str) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Directory blobs are written into.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    async fn save(
        &self,
        name: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        if !content_type.starts_with("image/") {
            return Err(StorageError::InvalidContentType(content_type.to_string()));
        }

        let path = self.base_path.join(name);
        tokio::fs::write(&path, data).await?;

        Ok(path.to_string_lossy().into_owned())
    }

    async fn get(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        Ok(tokio::fs::read(locator).await?)
    }

    async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(locator).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url_for(&self, locator: &str) -> String {
        let filename = Path::new(locator)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| locator.to_string());

        format!("{}/uploads/{}", self.base_url, filename)
    }
}
