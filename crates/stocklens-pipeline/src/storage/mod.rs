//! Object storage port
//!
//! Source files are referenced by an opaque location string
//! (`s3://bucket/key`, `file:///path`, or `mem://key`); the pipeline only
//! ever fetches whole objects and stores new ones.

use async_trait::async_trait;
use stocklens_common::StocklensError;

pub mod fs;
pub mod memory;
pub mod s3;

pub use fs::FsStorage;
pub use memory::MemoryStorage;
pub use s3::{S3Config, S3Storage};

/// Outcome of a successful upload
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Opaque location reference to persist on the dataset row
    pub location: String,
    /// SHA-256 of the stored bytes
    pub checksum: String,
    pub size: i64,
}

/// Whole-object storage access
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Fetch the bytes behind a location reference
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, StocklensError>;

    /// Store bytes under a key and return the location reference
    async fn store(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<StoredObject, StocklensError>;
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
