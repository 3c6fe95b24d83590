//! S3-compatible storage backend

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use stocklens_common::StocklensError;
use tracing::{debug, info};

use crate::storage::{sha256_hex, ObjectStorage, StoredObject};

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Custom endpoint for MinIO and friends
    pub endpoint: Option<String>,
    pub path_style: bool,
}

/// S3-backed [`ObjectStorage`]
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(config: S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "stocklens-storage",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());
        info!(bucket = %config.bucket, "S3 storage client initialized");

        Self {
            client,
            bucket: config.bucket,
        }
    }

    /// Split an `s3://bucket/key` location into its parts
    fn parse_location(location: &str) -> Result<(&str, &str), StocklensError> {
        let rest = location.strip_prefix("s3://").ok_or_else(|| {
            StocklensError::InvalidLocation(format!("Expected an s3:// location, got: {location}"))
        })?;
        rest.split_once('/').ok_or_else(|| {
            StocklensError::InvalidLocation(format!("Invalid S3 location format: {location}"))
        })
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, StocklensError> {
        let (bucket, key) = Self::parse_location(location)?;
        debug!(bucket, key, "Downloading object from S3");

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StocklensError::Storage(format!("Failed to download from S3: {e}")))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StocklensError::Storage(format!("Failed to read S3 response body: {e}")))?
            .into_bytes()
            .to_vec();

        debug!(bucket, key, size = data.len(), "Downloaded object from S3");
        Ok(data)
    }

    async fn store(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<StoredObject, StocklensError> {
        let checksum = sha256_hex(&data);
        let size = data.len() as i64;
        debug!(bucket = %self.bucket, key, size, "Uploading object to S3");

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .map_err(|e| StocklensError::Storage(format!("Failed to upload to S3: {e}")))?;

        info!(bucket = %self.bucket, key, "Uploaded object to S3");

        Ok(StoredObject {
            location: format!("s3://{}/{}", self.bucket, key),
            checksum,
            size,
        })
    }
}
