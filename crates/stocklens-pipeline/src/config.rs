//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::storage::S3Config;
use crate::workflow::{ExecutionConfig, RetryPolicy};

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default maximum number of concurrently running workflow instances.
pub const DEFAULT_MAX_CONCURRENT_WORKFLOWS: usize = 10;

/// Default initial retry backoff in milliseconds.
pub const DEFAULT_RETRY_INITIAL_INTERVAL_MS: u64 = 2_000;

/// Default multiplicative backoff factor.
pub const DEFAULT_RETRY_BACKOFF_COEFFICIENT: f64 = 2.0;

/// Default retry interval cap in milliseconds.
pub const DEFAULT_RETRY_MAXIMUM_INTERVAL_MS: u64 = 60_000;

/// Default maximum activity attempts.
pub const DEFAULT_RETRY_MAXIMUM_ATTEMPTS: u32 = 3;

/// Default per-attempt execution window in seconds.
pub const DEFAULT_START_TO_CLOSE_SECS: u64 = 30 * 60;

/// Default heartbeat stall timeout in seconds.
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 120;

/// Default filesystem storage directory.
pub const DEFAULT_STORAGE_PATH: &str = "./storage";

/// Default S3 region.
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Which object storage backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    S3,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "filesystem" | "fs" | "file" => Ok(StorageBackend::Filesystem),
            "s3" => Ok(StorageBackend::S3),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

/// Object storage settings
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Base directory for the filesystem backend
    pub base_dir: String,
    /// S3 settings, required when the backend is S3
    pub s3: Option<S3Config>,
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_concurrent_workflows: usize,
    pub retry: RetryPolicy,
    pub execution: ExecutionConfig,
    /// Postgres connection string; absent means in-memory state
    pub database_url: Option<String>,
    pub storage: StorageSettings,
}

impl PipelineConfig {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = PipelineConfig {
            max_concurrent_workflows: env_parse(
                "STOCKLENS_MAX_CONCURRENT_WORKFLOWS",
                DEFAULT_MAX_CONCURRENT_WORKFLOWS,
            ),
            retry: RetryPolicy {
                initial_interval: Duration::from_millis(env_parse(
                    "STOCKLENS_RETRY_INITIAL_INTERVAL_MS",
                    DEFAULT_RETRY_INITIAL_INTERVAL_MS,
                )),
                backoff_coefficient: env_parse(
                    "STOCKLENS_RETRY_BACKOFF_COEFFICIENT",
                    DEFAULT_RETRY_BACKOFF_COEFFICIENT,
                ),
                maximum_interval: Duration::from_millis(env_parse(
                    "STOCKLENS_RETRY_MAXIMUM_INTERVAL_MS",
                    DEFAULT_RETRY_MAXIMUM_INTERVAL_MS,
                )),
                maximum_attempts: env_parse(
                    "STOCKLENS_RETRY_MAXIMUM_ATTEMPTS",
                    DEFAULT_RETRY_MAXIMUM_ATTEMPTS,
                ),
            },
            execution: ExecutionConfig {
                start_to_close_timeout: Duration::from_secs(env_parse(
                    "STOCKLENS_START_TO_CLOSE_SECS",
                    DEFAULT_START_TO_CLOSE_SECS,
                )),
                heartbeat_timeout: Duration::from_secs(env_parse(
                    "STOCKLENS_HEARTBEAT_TIMEOUT_SECS",
                    DEFAULT_HEARTBEAT_TIMEOUT_SECS,
                )),
            },
            database_url: std::env::var("DATABASE_URL").ok(),
            storage: StorageSettings {
                backend: std::env::var("STORAGE_TYPE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_default(),
                base_dir: std::env::var("STORAGE_PATH")
                    .unwrap_or_else(|_| DEFAULT_STORAGE_PATH.to_string()),
                s3: load_s3_settings(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrent_workflows == 0 {
            anyhow::bail!("max_concurrent_workflows must be greater than 0");
        }

        if self.retry.maximum_attempts == 0 {
            anyhow::bail!("retry maximum_attempts must be greater than 0");
        }

        if self.retry.backoff_coefficient < 1.0 {
            anyhow::bail!(
                "retry backoff_coefficient ({}) must be at least 1.0",
                self.retry.backoff_coefficient
            );
        }

        if self.storage.backend == StorageBackend::S3 && self.storage.s3.is_none() {
            anyhow::bail!("S3 storage selected but S3_BUCKET / AWS credentials are not set");
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workflows: DEFAULT_MAX_CONCURRENT_WORKFLOWS,
            retry: RetryPolicy::default(),
            execution: ExecutionConfig::default(),
            database_url: None,
            storage: StorageSettings {
                backend: StorageBackend::Filesystem,
                base_dir: DEFAULT_STORAGE_PATH.to_string(),
                s3: None,
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn load_s3_settings() -> Option<S3Config> {
    let bucket = std::env::var("S3_BUCKET").ok()?;
    Some(S3Config {
        bucket,
        region: std::env::var("AWS_REGION").unwrap_or_else(|_| DEFAULT_S3_REGION.to_string()),
        access_key: std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
        secret_key: std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
        endpoint: std::env::var("S3_ENDPOINT").ok(),
        path_style: std::env::var("S3_PATH_STYLE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(false),
    })
}
