//! State store port
//!
//! Row-level read/write access to datasets, the append-only processing log,
//! and analysis results. Every mutation is an absolute "set" operation so
//! retried or concurrent writers converge instead of conflicting.

use async_trait::async_trait;
use serde_json::Value;
use stocklens_common::StocklensError;
use uuid::Uuid;

use crate::model::{AnalysisResult, Dataset, DatasetStatus, NewDataset, ProcessingLogEntry, StepStatus};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStateStore;
pub use postgres::PgStateStore;

/// Relational persistence for pipeline state
///
/// Implementations must provide single-row atomic updates: `set_status`
/// writes `status` and `workflow_id` in one operation so concurrent or
/// retried activities never observe a half-updated state.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn create_dataset(&self, new: NewDataset) -> Result<Dataset, StocklensError>;

    /// Fetch a dataset row; soft-deleted rows are not returned
    async fn get_dataset(&self, id: Uuid) -> Result<Option<Dataset>, StocklensError>;

    /// Absolute status write; `workflow_id` is stamped in the same
    /// operation when provided, left untouched when `None`
    async fn set_status(
        &self,
        id: Uuid,
        status: DatasetStatus,
        workflow_id: Option<&str>,
    ) -> Result<(), StocklensError>;

    /// Absolute write of status plus the transformation-metadata summary
    async fn set_status_and_metadata(
        &self,
        id: Uuid,
        status: DatasetStatus,
        workflow_id: Option<&str>,
        metadata: Value,
    ) -> Result<(), StocklensError>;

    /// Mark the row deleted without removing it; the audit log and analysis
    /// rows keep referencing it
    async fn soft_delete_dataset(&self, id: Uuid) -> Result<(), StocklensError>;

    async fn append_log(
        &self,
        dataset_id: Uuid,
        step: &str,
        status: StepStatus,
        message: &str,
    ) -> Result<(), StocklensError>;

    /// Most recent log entries first
    async fn recent_logs(
        &self,
        dataset_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ProcessingLogEntry>, StocklensError>;

    async fn insert_analysis(
        &self,
        dataset_id: Uuid,
        results: Value,
    ) -> Result<AnalysisResult, StocklensError>;

    async fn latest_analysis(
        &self,
        dataset_id: Uuid,
    ) -> Result<Option<AnalysisResult>, StocklensError>;
}
