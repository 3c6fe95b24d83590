//! In-memory state store
//!
//! Backs tests and local CLI runs. Mirrors the Postgres adapter's
//! semantics: absolute writes, append-only logs, soft deletes. Can be
//! switched into an "unavailable" mode to exercise the fail-open paths.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use stocklens_common::StocklensError;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{AnalysisResult, Dataset, DatasetStatus, NewDataset, ProcessingLogEntry, StepStatus};
use crate::store::StateStore;

#[derive(Default)]
struct Inner {
    datasets: HashMap<Uuid, Dataset>,
    logs: Vec<ProcessingLogEntry>,
    analyses: Vec<AnalysisResult>,
}

/// In-memory [`StateStore`] implementation
#[derive(Default)]
pub struct MemoryStateStore {
    inner: RwLock<Inner>,
    unavailable: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a state store outage: every call fails until re-enabled
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StocklensError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StocklensError::Database("state store unavailable".into()))
        } else {
            Ok(())
        }
    }

    /// Total log entry count, for test assertions
    pub async fn log_count(&self) -> usize {
        self.inner.read().await.logs.len()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn create_dataset(&self, new: NewDataset) -> Result<Dataset, StocklensError> {
        self.check_available()?;
        let now = Utc::now();
        let dataset = Dataset {
            id: Uuid::new_v4(),
            file_name: new.file_name,
            source_location: new.source_location,
            size_bytes: new.size_bytes,
            status: DatasetStatus::Uploaded,
            workflow_id: None,
            metadata: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .write()
            .await
            .datasets
            .insert(dataset.id, dataset.clone());
        Ok(dataset)
    }

    async fn get_dataset(&self, id: Uuid) -> Result<Option<Dataset>, StocklensError> {
        self.check_available()?;
        let inner = self.inner.read().await;
        Ok(inner
            .datasets
            .get(&id)
            .filter(|d| d.deleted_at.is_none())
            .cloned())
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: DatasetStatus,
        workflow_id: Option<&str>,
    ) -> Result<(), StocklensError> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        if let Some(dataset) = inner.datasets.get_mut(&id) {
            dataset.status = status;
            if let Some(workflow_id) = workflow_id {
                dataset.workflow_id = Some(workflow_id.to_string());
            }
            dataset.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_status_and_metadata(
        &self,
        id: Uuid,
        status: DatasetStatus,
        workflow_id: Option<&str>,
        metadata: Value,
    ) -> Result<(), StocklensError> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        if let Some(dataset) = inner.datasets.get_mut(&id) {
            dataset.status = status;
            if let Some(workflow_id) = workflow_id {
                dataset.workflow_id = Some(workflow_id.to_string());
            }
            dataset.metadata = Some(metadata);
            dataset.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn soft_delete_dataset(&self, id: Uuid) -> Result<(), StocklensError> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        if let Some(dataset) = inner.datasets.get_mut(&id) {
            dataset.deleted_at = Some(Utc::now());
            dataset.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn append_log(
        &self,
        dataset_id: Uuid,
        step: &str,
        status: StepStatus,
        message: &str,
    ) -> Result<(), StocklensError> {
        self.check_available()?;
        self.inner.write().await.logs.push(ProcessingLogEntry {
            id: Uuid::new_v4(),
            dataset_id,
            step: step.to_string(),
            status,
            message: message.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn recent_logs(
        &self,
        dataset_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ProcessingLogEntry>, StocklensError> {
        self.check_available()?;
        let inner = self.inner.read().await;
        let mut logs: Vec<ProcessingLogEntry> = inner
            .logs
            .iter()
            .filter(|l| l.dataset_id == dataset_id)
            .cloned()
            .collect();
        logs.reverse();
        logs.truncate(limit);
        Ok(logs)
    }

    async fn insert_analysis(
        &self,
        dataset_id: Uuid,
        results: Value,
    ) -> Result<AnalysisResult, StocklensError> {
        self.check_available()?;
        let analysis = AnalysisResult {
            id: Uuid::new_v4(),
            dataset_id,
            results,
            created_at: Utc::now(),
        };
        self.inner.write().await.analyses.push(analysis.clone());
        Ok(analysis)
    }

    async fn latest_analysis(
        &self,
        dataset_id: Uuid,
    ) -> Result<Option<AnalysisResult>, StocklensError> {
        self.check_available()?;
        let inner = self.inner.read().await;
        Ok(inner
            .analyses
            .iter()
            .rev()
            .find(|a| a.dataset_id == dataset_id)
            .cloned())
    }
}
