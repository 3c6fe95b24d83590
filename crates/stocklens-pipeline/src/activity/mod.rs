//! Activities: the retryable units of work the orchestrator invokes
//!
//! Each activity wraps an engine call with its persistence side-effects
//! (status updates, audit log rows) and liveness signaling. Every write is
//! an absolute "set", so re-executing an activity produces the same end
//! state as a first attempt.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{ActivityError, Stage};
use crate::model::{Dataset, DatasetStatus, ProcessingLogEntry, StepStatus, WorkflowKind};
use crate::storage::ObjectStorage;
use crate::store::StateStore;
use stocklens_engine::{analysis, frame, transform};

pub mod heartbeat;

pub use heartbeat::{Heartbeat, HeartbeatSignal};

/// Log entries returned by a progress query
pub const RECENT_LOG_LIMIT: usize = 10;

/// Result of the idempotency check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStateCheck {
    pub already_processed: bool,
    pub previous_workflow_id: Option<String>,
}

impl WorkflowStateCheck {
    fn not_processed() -> Self {
        Self {
            already_processed: false,
            previous_workflow_id: None,
        }
    }
}

/// Read-only aggregation of pipeline state for UI polling
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowProgress {
    pub dataset_id: Uuid,
    pub status: String,
    pub workflow_id: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub recent_logs: Vec<ProcessingLogEntry>,
    pub latest_analysis: Option<Value>,
}

/// The activity implementations, holding the persistence ports
pub struct Activities {
    store: Arc<dyn StateStore>,
    storage: Arc<dyn ObjectStorage>,
}

impl Activities {
    pub fn new(store: Arc<dyn StateStore>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { store, storage }
    }

    async fn load_dataset(&self, dataset_id: Uuid) -> Result<Dataset, ActivityError> {
        match self.store.get_dataset(dataset_id).await {
            Ok(Some(dataset)) => Ok(dataset),
            Ok(None) => {
                error!(dataset_id = %dataset_id, "Dataset not found - it may have been deleted");
                Err(ActivityError::NotFound(dataset_id))
            }
            Err(e) => Err(ActivityError::Store(e)),
        }
    }

    async fn log(
        &self,
        dataset_id: Uuid,
        step: &str,
        status: StepStatus,
        message: &str,
    ) -> Result<(), ActivityError> {
        info!(dataset_id = %dataset_id, step, status = status.as_str(), message, "Pipeline step");
        self.store
            .append_log(dataset_id, step, status, message)
            .await
            .map_err(ActivityError::Store)
    }

    /// Best-effort failure bookkeeping; never masks the original error
    async fn log_failure(&self, dataset_id: Uuid, step: &str, message: &str) {
        if let Err(e) = self
            .store
            .append_log(dataset_id, step, StepStatus::Failed, message)
            .await
        {
            warn!(dataset_id = %dataset_id, error = %e, "Failed to record failure log entry");
        }
    }

    /// Check whether this dataset was already driven to the workflow type's
    /// terminal state by a different workflow instance
    ///
    /// Fails open: if the state store is unreachable the check reports "not
    /// processed", favoring availability over strict duplicate suppression.
    pub async fn check_workflow_state(
        &self,
        dataset_id: Uuid,
        kind: WorkflowKind,
        current_workflow_id: &str,
    ) -> WorkflowStateCheck {
        info!(dataset_id = %dataset_id, kind = %kind, "Checking workflow state");

        let dataset = match self.store.get_dataset(dataset_id).await {
            Ok(Some(dataset)) => dataset,
            Ok(None) => return WorkflowStateCheck::not_processed(),
            Err(e) => {
                warn!(dataset_id = %dataset_id, error = %e, "State check failed, proceeding with processing");
                return WorkflowStateCheck::not_processed();
            }
        };

        let expected = kind.expected_terminal_status();
        match dataset.workflow_id {
            Some(previous) if dataset.status == expected && previous != current_workflow_id => {
                info!(
                    dataset_id = %dataset_id,
                    previous_workflow_id = %previous,
                    "Dataset already processed by an earlier workflow"
                );
                WorkflowStateCheck {
                    already_processed: true,
                    previous_workflow_id: Some(previous),
                }
            }
            _ => WorkflowStateCheck::not_processed(),
        }
    }

    /// Run the cleaning pipeline over a dataset's source file
    pub async fn clean_dataset(
        &self,
        dataset_id: Uuid,
        workflow_id: &str,
        heartbeat: &Heartbeat,
    ) -> Result<&'static str, ActivityError> {
        info!(dataset_id = %dataset_id, workflow_id, "Starting cleaning");

        let dataset = self.load_dataset(dataset_id).await?;

        self.log(dataset_id, "INIT", StepStatus::Started, "Cleaning workflow started")
            .await?;
        heartbeat.beat("INIT", 0, 5);

        // Stamp the owning workflow together with the status transition
        self.store
            .set_status(dataset_id, DatasetStatus::Cleaning, Some(workflow_id))
            .await
            .map_err(ActivityError::Store)?;

        match self.run_clean_steps(&dataset, heartbeat).await {
            Ok(()) => {
                self.store
                    .set_status(dataset_id, DatasetStatus::Ready, Some(workflow_id))
                    .await
                    .map_err(ActivityError::Store)?;
                self.log(
                    dataset_id,
                    "COMPLETE",
                    StepStatus::Success,
                    "Dataset is ready for analysis",
                )
                .await?;
                heartbeat.beat("COMPLETE", 5, 5);
                Ok("CLEAN_SUCCESS")
            }
            Err(e) => {
                self.log_failure(dataset_id, "ERROR", &e.to_string()).await;
                if let Err(update_err) = self
                    .store
                    .set_status(dataset_id, DatasetStatus::Failed, None)
                    .await
                {
                    warn!(dataset_id = %dataset_id, error = %update_err, "Failed to mark dataset FAILED");
                }
                Err(e)
            }
        }
    }

    async fn run_clean_steps(
        &self,
        dataset: &Dataset,
        heartbeat: &Heartbeat,
    ) -> Result<(), ActivityError> {
        let bytes = self
            .storage
            .fetch(&dataset.source_location)
            .await
            .map_err(ActivityError::Storage)?;

        let result = transform::transform_dataset(&bytes).map_err(|e| {
            ActivityError::DataQuality {
                stage: Stage::Clean,
                message: e.to_string(),
            }
        })?;
        heartbeat.beat("TRANSFORM", 1, 5);

        self.log(
            dataset.id,
            "REMOVE_DUPLICATES",
            StepStatus::Success,
            &format!("Removed {} duplicate rows", result.duplicates_removed),
        )
        .await?;
        heartbeat.beat("REMOVE_DUPLICATES", 2, 5);

        self.log(
            dataset.id,
            "NORMALIZE_COLUMNS",
            StepStatus::Success,
            &format!("Standardized {} column names", result.columns_processed),
        )
        .await?;
        heartbeat.beat("NORMALIZE_COLUMNS", 3, 5);

        self.log(
            dataset.id,
            "VALIDATE_SCHEMA",
            StepStatus::Success,
            &format!("Validated schema with {} rows", result.rows_processed),
        )
        .await?;
        heartbeat.beat("VALIDATE_SCHEMA", 4, 5);

        self.log(
            dataset.id,
            "DETECT_TYPES",
            StepStatus::Success,
            &format!(
                "Detected {} categorical, {} numeric, {} date columns",
                result.categorical_columns.len(),
                result.numeric_columns.len(),
                result.date_columns.len()
            ),
        )
        .await?;
        heartbeat.beat("DETECT_TYPES", 5, 5);

        Ok(())
    }

    /// Run the transformation pipeline and persist its metadata summary
    pub async fn transform_dataset(
        &self,
        dataset_id: Uuid,
        workflow_id: &str,
        _transformations: &[Value],
        heartbeat: &Heartbeat,
    ) -> Result<&'static str, ActivityError> {
        info!(dataset_id = %dataset_id, workflow_id, "Starting transformation");

        let dataset = self.load_dataset(dataset_id).await?;

        self.log(
            dataset_id,
            "TRANSFORM_INIT",
            StepStatus::Started,
            "Transformation workflow started",
        )
        .await?;
        self.store
            .set_status(dataset_id, DatasetStatus::Transforming, Some(workflow_id))
            .await
            .map_err(ActivityError::Store)?;
        heartbeat.beat("TRANSFORM_INIT", 0, 4);

        match self
            .run_transform_steps(&dataset, workflow_id, heartbeat)
            .await
        {
            Ok(()) => {
                self.log(
                    dataset_id,
                    "TRANSFORM_COMPLETE",
                    StepStatus::Success,
                    "Dataset transformation complete",
                )
                .await?;
                Ok("TRANSFORM_SUCCESS")
            }
            Err(e) => {
                // The failure status itself is owned by the workflow's
                // rollback, which makes the partial-failure state explicit
                self.log_failure(dataset_id, "TRANSFORM_ERROR", &e.to_string())
                    .await;
                Err(e)
            }
        }
    }

    async fn run_transform_steps(
        &self,
        dataset: &Dataset,
        workflow_id: &str,
        heartbeat: &Heartbeat,
    ) -> Result<(), ActivityError> {
        let bytes = self
            .storage
            .fetch(&dataset.source_location)
            .await
            .map_err(ActivityError::Storage)?;

        let result = transform::transform_dataset(&bytes).map_err(|e| {
            ActivityError::DataQuality {
                stage: Stage::Transform,
                message: e.to_string(),
            }
        })?;
        heartbeat.beat("TRANSFORM", 1, 4);

        self.log(
            dataset.id,
            "ENCODE_CATEGORICAL",
            StepStatus::Success,
            &format!(
                "Encoded {} categorical columns",
                result.categorical_columns.len()
            ),
        )
        .await?;
        heartbeat.beat("ENCODE_CATEGORICAL", 2, 4);

        self.log(
            dataset.id,
            "SCALE_NUMERIC",
            StepStatus::Success,
            &format!("Scaled {} numeric columns", result.numeric_columns.len()),
        )
        .await?;
        heartbeat.beat("SCALE_NUMERIC", 3, 4);

        self.log(
            dataset.id,
            "PARSE_DATES",
            StepStatus::Success,
            &format!("Parsed {} date columns", result.date_columns.len()),
        )
        .await?;
        heartbeat.beat("PARSE_DATES", 4, 4);

        self.log(
            dataset.id,
            "CREATE_FEATURES",
            StepStatus::Success,
            &format!("Created {} derived features", result.derived_features.len()),
        )
        .await?;

        let metadata = serde_json::json!({
            "duplicatesRemoved": result.duplicates_removed,
            "categoricalColumns": result.categorical_columns,
            "numericColumns": result.numeric_columns,
            "dateColumns": result.date_columns,
            "derivedFeatures": result.derived_features,
        });
        self.store
            .set_status_and_metadata(
                dataset.id,
                DatasetStatus::Transformed,
                Some(workflow_id),
                metadata,
            )
            .await
            .map_err(ActivityError::Store)?;

        Ok(())
    }

    /// Run the inventory analysis and persist a new analysis row
    ///
    /// Raw records are loaded a second time, independent of the transform
    /// step, because the analysis needs original values rather than derived
    /// statistics alone.
    pub async fn perform_eda(
        &self,
        dataset_id: Uuid,
        workflow_id: &str,
        heartbeat: &Heartbeat,
    ) -> Result<&'static str, ActivityError> {
        info!(dataset_id = %dataset_id, workflow_id, "Starting EDA");

        let dataset = self.load_dataset(dataset_id).await?;

        self.log(dataset_id, "EDA_INIT", StepStatus::Started, "EDA workflow started")
            .await?;
        self.store
            .set_status(dataset_id, DatasetStatus::EdaRunning, Some(workflow_id))
            .await
            .map_err(ActivityError::Store)?;
        heartbeat.beat("EDA_RUNNING", 1, 5);

        match self.run_eda_steps(&dataset, heartbeat).await {
            Ok(()) => {
                self.store
                    .set_status(dataset_id, DatasetStatus::EdaComplete, Some(workflow_id))
                    .await
                    .map_err(ActivityError::Store)?;
                self.log(
                    dataset_id,
                    "EDA_COMPLETE",
                    StepStatus::Success,
                    "Inventory analysis complete",
                )
                .await?;
                Ok("EDA_SUCCESS")
            }
            Err(e) => {
                self.log_failure(dataset_id, "EDA_ERROR", &e.to_string()).await;
                // Mark the EDA-specific failure state first so the dataset
                // is never left looking like a clean-stage failure
                if let Err(update_err) = self
                    .store
                    .set_status(dataset_id, DatasetStatus::EdaFailed, None)
                    .await
                {
                    warn!(dataset_id = %dataset_id, error = %update_err, "Failed to mark dataset EDA_FAILED");
                }
                Err(e)
            }
        }
    }

    async fn run_eda_steps(
        &self,
        dataset: &Dataset,
        heartbeat: &Heartbeat,
    ) -> Result<(), ActivityError> {
        let bytes = self
            .storage
            .fetch(&dataset.source_location)
            .await
            .map_err(ActivityError::Storage)?;

        let eda_err = |e: stocklens_engine::EngineError| ActivityError::DataQuality {
            stage: Stage::Eda,
            message: e.to_string(),
        };

        let raw = frame::load_csv(&bytes).map_err(eda_err)?;
        heartbeat.beat("LOAD_DATA", 2, 5);

        let transform_result = transform::transform_dataset(&bytes).map_err(eda_err)?;
        heartbeat.beat("ANALYZE", 3, 5);

        let results = analysis::analyze_inventory(&raw, &transform_result).map_err(eda_err)?;
        heartbeat.beat("GENERATE_ANALYSIS", 4, 5);

        self.store
            .insert_analysis(dataset.id, results)
            .await
            .map_err(ActivityError::Store)?;
        heartbeat.beat("STORE_RESULTS", 5, 5);

        Ok(())
    }

    /// Unconditionally overwrite the dataset status with a failure code
    pub async fn rollback_dataset(
        &self,
        dataset_id: Uuid,
        failure_status: DatasetStatus,
    ) -> Result<(), ActivityError> {
        info!(dataset_id = %dataset_id, status = %failure_status, "Rolling back dataset");

        self.store
            .set_status(dataset_id, failure_status, None)
            .await
            .map_err(ActivityError::Store)?;
        self.log(
            dataset_id,
            "ROLLBACK",
            StepStatus::Success,
            &format!("Dataset rolled back to {failure_status}"),
        )
        .await?;
        Ok(())
    }

    /// Read-only progress aggregation; usable whether or not a workflow is
    /// actively running
    pub async fn query_workflow_progress(
        &self,
        dataset_id: Uuid,
    ) -> Result<WorkflowProgress, ActivityError> {
        let dataset = match self
            .store
            .get_dataset(dataset_id)
            .await
            .map_err(ActivityError::Store)?
        {
            Some(dataset) => dataset,
            None => {
                return Ok(WorkflowProgress {
                    dataset_id,
                    status: "NOT_FOUND".to_string(),
                    workflow_id: None,
                    created_at: None,
                    updated_at: None,
                    recent_logs: Vec::new(),
                    latest_analysis: None,
                })
            }
        };

        let recent_logs = self
            .store
            .recent_logs(dataset_id, RECENT_LOG_LIMIT)
            .await
            .map_err(ActivityError::Store)?;
        let latest_analysis = self
            .store
            .latest_analysis(dataset_id)
            .await
            .map_err(ActivityError::Store)?
            .map(|a| a.results);

        Ok(WorkflowProgress {
            dataset_id,
            status: dataset.status.as_str().to_string(),
            workflow_id: dataset.workflow_id,
            created_at: Some(dataset.created_at),
            updated_at: Some(dataset.updated_at),
            recent_logs,
            latest_analysis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewDataset;
    use crate::storage::MemoryStorage;
    use crate::store::MemoryStateStore;

    const INVENTORY_CSV: &[u8] =
        b"product,qty,price,reorder\nWidget,10,2.50,50\nGadget,0,5.00,25\nSprocket,100,1.25,50\n";

    struct Fixture {
        store: Arc<MemoryStateStore>,
        storage: Arc<MemoryStorage>,
        activities: Activities,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStateStore::new());
            let storage = Arc::new(MemoryStorage::new());
            let activities = Activities::new(store.clone(), storage.clone());
            Self {
                store,
                storage,
                activities,
            }
        }

        async fn dataset_with_bytes(&self, bytes: &[u8]) -> Dataset {
            let location = self.storage.put("datasets/test.csv", bytes.to_vec()).await;
            self.store
                .create_dataset(NewDataset {
                    file_name: "test.csv".into(),
                    source_location: location,
                    size_bytes: bytes.len() as i64,
                })
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_clean_dataset_happy_path() {
        let fx = Fixture::new();
        let dataset = fx.dataset_with_bytes(INVENTORY_CSV).await;

        let result = fx
            .activities
            .clean_dataset(dataset.id, "clean-1", &Heartbeat::disabled())
            .await
            .unwrap();
        assert_eq!(result, "CLEAN_SUCCESS");

        let updated = fx.store.get_dataset(dataset.id).await.unwrap().unwrap();
        assert_eq!(updated.status, DatasetStatus::Ready);
        assert_eq!(updated.workflow_id.as_deref(), Some("clean-1"));

        let logs = fx.store.recent_logs(dataset.id, 20).await.unwrap();
        let steps: Vec<&str> = logs.iter().map(|l| l.step.as_str()).rev().collect();
        assert_eq!(
            steps,
            vec![
                "INIT",
                "REMOVE_DUPLICATES",
                "NORMALIZE_COLUMNS",
                "VALIDATE_SCHEMA",
                "DETECT_TYPES",
                "COMPLETE"
            ]
        );
    }

    #[tokio::test]
    async fn test_clean_dataset_not_found_is_permanent() {
        let fx = Fixture::new();
        let err = fx
            .activities
            .clean_dataset(Uuid::new_v4(), "clean-1", &Heartbeat::disabled())
            .await
            .unwrap_err();

        assert!(matches!(err, ActivityError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_clean_dataset_marks_failed_on_error() {
        let fx = Fixture::new();
        // Dataset row exists but the object is gone
        let dataset = fx
            .store
            .create_dataset(NewDataset {
                file_name: "gone.csv".into(),
                source_location: "mem://gone".into(),
                size_bytes: 0,
            })
            .await
            .unwrap();

        let err = fx
            .activities
            .clean_dataset(dataset.id, "clean-1", &Heartbeat::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityError::Storage(_)));

        let updated = fx.store.get_dataset(dataset.id).await.unwrap().unwrap();
        assert_eq!(updated.status, DatasetStatus::Failed);

        let logs = fx.store.recent_logs(dataset.id, 5).await.unwrap();
        assert_eq!(logs[0].step, "ERROR");
        assert_eq!(logs[0].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_transform_dataset_persists_metadata() {
        let fx = Fixture::new();
        let dataset = fx.dataset_with_bytes(INVENTORY_CSV).await;

        let result = fx
            .activities
            .transform_dataset(dataset.id, "transform-1", &[], &Heartbeat::disabled())
            .await
            .unwrap();
        assert_eq!(result, "TRANSFORM_SUCCESS");

        let updated = fx.store.get_dataset(dataset.id).await.unwrap().unwrap();
        assert_eq!(updated.status, DatasetStatus::Transformed);
        assert_eq!(updated.workflow_id.as_deref(), Some("transform-1"));

        let metadata = updated.metadata.unwrap();
        assert_eq!(metadata["duplicatesRemoved"], 0);
        assert_eq!(metadata["numericColumns"], serde_json::json!(["qty", "price", "reorder"]));
        assert_eq!(
            metadata["derivedFeatures"],
            serde_json::json!(["numeric_sum", "numeric_avg"])
        );
    }

    #[tokio::test]
    async fn test_transform_dataset_invalid_csv_is_data_quality() {
        let fx = Fixture::new();
        let dataset = fx.dataset_with_bytes(b"\xff\xfe\x00 not a csv").await;

        let err = fx
            .activities
            .transform_dataset(dataset.id, "transform-1", &[], &Heartbeat::disabled())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ActivityError::DataQuality {
                stage: Stage::Transform,
                ..
            }
        ));

        // Failure status is the rollback's job; the activity records the
        // audit entry only
        let logs = fx.store.recent_logs(dataset.id, 5).await.unwrap();
        assert_eq!(logs[0].step, "TRANSFORM_ERROR");
        let updated = fx.store.get_dataset(dataset.id).await.unwrap().unwrap();
        assert_eq!(updated.status, DatasetStatus::Transforming);
    }

    #[tokio::test]
    async fn test_perform_eda_writes_analysis_row() {
        let fx = Fixture::new();
        let dataset = fx.dataset_with_bytes(INVENTORY_CSV).await;

        let result = fx
            .activities
            .perform_eda(dataset.id, "transform-1", &Heartbeat::disabled())
            .await
            .unwrap();
        assert_eq!(result, "EDA_SUCCESS");

        let updated = fx.store.get_dataset(dataset.id).await.unwrap().unwrap();
        assert_eq!(updated.status, DatasetStatus::EdaComplete);

        let analysis = fx.store.latest_analysis(dataset.id).await.unwrap().unwrap();
        assert_eq!(analysis.results["summary"]["total_products"], 3);
        assert_eq!(analysis.results["stock_status"]["out_of_stock"], 1);
        assert_eq!(analysis.results["stock_status"]["low_stock"], 1);
    }

    #[tokio::test]
    async fn test_perform_eda_failure_marks_eda_failed() {
        let fx = Fixture::new();
        // Header-only file: nothing to analyze
        let dataset = fx.dataset_with_bytes(b"qty\n").await;

        let err = fx
            .activities
            .perform_eda(dataset.id, "transform-1", &Heartbeat::disabled())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ActivityError::DataQuality {
                stage: Stage::Eda,
                ..
            }
        ));

        let updated = fx.store.get_dataset(dataset.id).await.unwrap().unwrap();
        assert_eq!(updated.status, DatasetStatus::EdaFailed);
    }

    #[tokio::test]
    async fn test_rollback_overwrites_status_and_logs() {
        let fx = Fixture::new();
        let dataset = fx.dataset_with_bytes(INVENTORY_CSV).await;
        fx.store
            .set_status(dataset.id, DatasetStatus::Transforming, Some("t-1"))
            .await
            .unwrap();

        fx.activities
            .rollback_dataset(dataset.id, DatasetStatus::TransformFailed)
            .await
            .unwrap();

        let updated = fx.store.get_dataset(dataset.id).await.unwrap().unwrap();
        assert_eq!(updated.status, DatasetStatus::TransformFailed);

        let logs = fx.store.recent_logs(dataset.id, 1).await.unwrap();
        assert_eq!(logs[0].step, "ROLLBACK");
        assert_eq!(logs[0].status, StepStatus::Success);
    }

    #[tokio::test]
    async fn test_check_workflow_state_detects_prior_completion() {
        let fx = Fixture::new();
        let dataset = fx.dataset_with_bytes(INVENTORY_CSV).await;
        fx.store
            .set_status(dataset.id, DatasetStatus::Ready, Some("clean-old"))
            .await
            .unwrap();

        let check = fx
            .activities
            .check_workflow_state(dataset.id, WorkflowKind::Clean, "clean-new")
            .await;
        assert!(check.already_processed);
        assert_eq!(check.previous_workflow_id.as_deref(), Some("clean-old"));

        // Same workflow instance re-checking its own completion proceeds
        let check = fx
            .activities
            .check_workflow_state(dataset.id, WorkflowKind::Clean, "clean-old")
            .await;
        assert!(!check.already_processed);

        // Different workflow type looks for a different terminal state
        let check = fx
            .activities
            .check_workflow_state(dataset.id, WorkflowKind::Transform, "transform-1")
            .await;
        assert!(!check.already_processed);
    }

    #[tokio::test]
    async fn test_check_workflow_state_fails_open() {
        let fx = Fixture::new();
        let dataset = fx.dataset_with_bytes(INVENTORY_CSV).await;
        fx.store
            .set_status(dataset.id, DatasetStatus::Ready, Some("clean-old"))
            .await
            .unwrap();

        fx.store.set_unavailable(true);
        let check = fx
            .activities
            .check_workflow_state(dataset.id, WorkflowKind::Clean, "clean-new")
            .await;
        assert!(!check.already_processed);
    }

    #[tokio::test]
    async fn test_query_workflow_progress() {
        let fx = Fixture::new();
        let dataset = fx.dataset_with_bytes(INVENTORY_CSV).await;

        fx.activities
            .clean_dataset(dataset.id, "clean-1", &Heartbeat::disabled())
            .await
            .unwrap();
        fx.activities
            .transform_dataset(dataset.id, "transform-1", &[], &Heartbeat::disabled())
            .await
            .unwrap();
        fx.activities
            .perform_eda(dataset.id, "transform-1", &Heartbeat::disabled())
            .await
            .unwrap();

        let progress = fx
            .activities
            .query_workflow_progress(dataset.id)
            .await
            .unwrap();

        assert_eq!(progress.status, "EDA_COMPLETE");
        assert_eq!(progress.workflow_id.as_deref(), Some("transform-1"));
        assert_eq!(progress.recent_logs.len(), RECENT_LOG_LIMIT);
        assert!(progress.latest_analysis.is_some());
    }

    #[tokio::test]
    async fn test_query_workflow_progress_not_found() {
        let fx = Fixture::new();
        let progress = fx
            .activities
            .query_workflow_progress(Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(progress.status, "NOT_FOUND");
        assert!(progress.recent_logs.is_empty());
        assert!(progress.latest_analysis.is_none());
    }

    #[tokio::test]
    async fn test_activity_reexecution_converges() {
        let fx = Fixture::new();
        let dataset = fx.dataset_with_bytes(INVENTORY_CSV).await;

        fx.activities
            .clean_dataset(dataset.id, "clean-1", &Heartbeat::disabled())
            .await
            .unwrap();
        let first = fx.store.get_dataset(dataset.id).await.unwrap().unwrap();

        // A retried attempt produces the same end state
        fx.activities
            .clean_dataset(dataset.id, "clean-1", &Heartbeat::disabled())
            .await
            .unwrap();
        let second = fx.store.get_dataset(dataset.id).await.unwrap().unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(first.workflow_id, second.workflow_id);
    }
}
