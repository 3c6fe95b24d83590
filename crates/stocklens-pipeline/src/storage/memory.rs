//! In-memory storage backend for tests

use async_trait::async_trait;
use std::collections::HashMap;
use stocklens_common::StocklensError;
use tokio::sync::RwLock;

use crate::storage::{sha256_hex, ObjectStorage, StoredObject};

/// In-memory [`ObjectStorage`] keyed by `mem://` locations
#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, returning its location
    pub async fn put(&self, key: &str, data: Vec<u8>) -> String {
        let location = format!("mem://{key}");
        self.objects.write().await.insert(location.clone(), data);
        location
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, StocklensError> {
        self.objects
            .read()
            .await
            .get(location)
            .cloned()
            .ok_or_else(|| StocklensError::Storage(format!("No such object: {location}")))
    }

    async fn store(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: Option<String>,
    ) -> Result<StoredObject, StocklensError> {
        let checksum = sha256_hex(&data);
        let size = data.len() as i64;
        let location = self.put(key, data).await;
        Ok(StoredObject {
            location,
            checksum,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let storage = MemoryStorage::new();
        let stored = storage.store("k", b"abc".to_vec(), None).await.unwrap();

        assert_eq!(stored.location, "mem://k");
        assert_eq!(storage.fetch("mem://k").await.unwrap(), b"abc");
        assert!(storage.fetch("mem://missing").await.is_err());
    }
}
