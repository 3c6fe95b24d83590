//! Trigger surface
//!
//! The contracts exposed to collaborators: start a workflow under a
//! caller-chosen idempotency key, upload a dataset (which persists the
//! file and metadata, then starts the clean workflow asynchronously),
//! request a transform, retrigger any stage, and poll progress.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::activity::{Activities, WorkflowProgress};
use crate::error::ServiceError;
use crate::model::{Dataset, DatasetStatus, NewDataset, WorkflowKind};
use crate::storage::ObjectStorage;
use crate::store::StateStore;
use crate::worker::{WorkerConfig, WorkerPool, WorkflowHandle};
use crate::workflow::WorkflowInput;

/// The pipeline's public entry points
pub struct PipelineService {
    store: Arc<dyn StateStore>,
    storage: Arc<dyn ObjectStorage>,
    activities: Arc<Activities>,
    pool: WorkerPool,
}

impl PipelineService {
    pub fn new(
        store: Arc<dyn StateStore>,
        storage: Arc<dyn ObjectStorage>,
        worker_config: WorkerConfig,
    ) -> Self {
        let activities = Arc::new(Activities::new(store.clone(), storage.clone()));
        let pool = WorkerPool::new(activities.clone(), worker_config);
        Self {
            store,
            storage,
            activities,
            pool,
        }
    }

    /// Generic workflow start contract:
    /// `start(workflowType, idempotencyKey, datasetId[, transformations])`
    pub fn start(
        &self,
        kind: WorkflowKind,
        idempotency_key: impl Into<String>,
        dataset_id: Uuid,
        transformations: Vec<serde_json::Value>,
    ) -> WorkflowHandle {
        let workflow_id = idempotency_key.into();
        info!(workflow_id = %workflow_id, dataset_id = %dataset_id, kind = %kind, "Starting workflow");
        self.pool.submit(WorkflowInput {
            kind,
            workflow_id,
            dataset_id,
            transformations,
        })
    }

    /// Persist an uploaded file plus its metadata row, then kick off the
    /// clean workflow
    ///
    /// The returned handle is informational: the upload has succeeded once
    /// the metadata row exists, and the pipeline's outcome is observed via
    /// the dataset status and the progress query, never this call.
    pub async fn upload_dataset(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(Dataset, WorkflowHandle), ServiceError> {
        let key = format!("datasets/{}/{}", Uuid::new_v4(), file_name);
        let stored = self
            .storage
            .store(&key, bytes, Some("text/csv".to_string()))
            .await?;

        let dataset = self
            .store
            .create_dataset(NewDataset {
                file_name: file_name.to_string(),
                source_location: stored.location,
                size_bytes: stored.size,
            })
            .await?;

        info!(dataset_id = %dataset.id, file_name, size_bytes = dataset.size_bytes, "Dataset uploaded");

        let handle = self.start(
            WorkflowKind::Clean,
            format!("clean-{}", dataset.id),
            dataset.id,
            Vec::new(),
        );

        Ok((dataset, handle))
    }

    /// Start the transform workflow; the dataset must be `READY`
    pub async fn request_transform(
        &self,
        dataset_id: Uuid,
        transformations: Vec<serde_json::Value>,
    ) -> Result<WorkflowHandle, ServiceError> {
        let dataset = self
            .store
            .get_dataset(dataset_id)
            .await?
            .ok_or(ServiceError::NotFound(dataset_id))?;

        if dataset.status != DatasetStatus::Ready {
            return Err(ServiceError::Validation(format!(
                "Dataset cannot be transformed. Current status: {}",
                dataset.status
            )));
        }

        Ok(self.start(
            WorkflowKind::Transform,
            format!("transform-{}-{}", dataset_id, Uuid::new_v4()),
            dataset_id,
            transformations,
        ))
    }

    /// Re-run a stage against a dataset in any state, under a fresh
    /// idempotency key (the operator recovery path)
    pub async fn retrigger(
        &self,
        dataset_id: Uuid,
        kind: WorkflowKind,
    ) -> Result<WorkflowHandle, ServiceError> {
        let dataset = self
            .store
            .get_dataset(dataset_id)
            .await?
            .ok_or(ServiceError::NotFound(dataset_id))?;

        let prefix = match kind {
            WorkflowKind::Clean => "clean",
            WorkflowKind::Transform => "transform",
        };
        let workflow_id = format!("{prefix}-{}-retrigger-{}", dataset.id, Uuid::new_v4());
        info!(dataset_id = %dataset_id, workflow_id = %workflow_id, status = %dataset.status, "Retriggering workflow");

        Ok(self.start(kind, workflow_id, dataset_id, Vec::new()))
    }

    /// Progress query contract:
    /// `queryProgress(datasetId) -> {status, workflowId, recentLogs, latestAnalysis}`
    pub async fn query_progress(&self, dataset_id: Uuid) -> Result<WorkflowProgress, ServiceError> {
        self.activities
            .query_workflow_progress(dataset_id)
            .await
            .map_err(|e| ServiceError::Validation(e.to_string()))
    }
}
