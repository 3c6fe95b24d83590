//! Filesystem storage backend
//!
//! Stores objects under a base directory and references them with
//! `file://` locations. Used for local deployments and the CLI.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use stocklens_common::StocklensError;
use tracing::debug;

use crate::storage::{sha256_hex, ObjectStorage, StoredObject};

/// Filesystem-backed [`ObjectStorage`]
#[derive(Debug, Clone)]
pub struct FsStorage {
    base_dir: PathBuf,
}

impl FsStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_from_location(location: &str) -> Result<&Path, StocklensError> {
        location
            .strip_prefix("file://")
            .map(Path::new)
            .ok_or_else(|| {
                StocklensError::InvalidLocation(format!(
                    "Expected a file:// location, got: {location}"
                ))
            })
    }
}

#[async_trait]
impl ObjectStorage for FsStorage {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, StocklensError> {
        let path = Self::path_from_location(location)?;
        debug!(path = %path.display(), "Reading object from filesystem");
        Ok(tokio::fs::read(path).await?)
    }

    async fn store(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: Option<String>,
    ) -> Result<StoredObject, StocklensError> {
        let full_path = self.base_dir.join(key);
        if let Some(dir) = full_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let checksum = sha256_hex(&data);
        let size = data.len() as i64;
        tokio::fs::write(&full_path, data).await?;

        debug!(path = %full_path.display(), size, "Stored object on filesystem");

        Ok(StoredObject {
            location: format!("file://{}", full_path.display()),
            checksum,
            size,
        })
    }
}
