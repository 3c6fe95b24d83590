//! Pipeline data model
//!
//! The dataset row is the single source of truth for pipeline state;
//! `status` and `workflow_id` are always written together by the activity
//! that performs a transition. The processing log is append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dataset lifecycle states
///
/// Forward path: `UPLOADED -> CLEANING -> READY -> TRANSFORMING ->
/// TRANSFORMED -> EDA_RUNNING -> EDA_COMPLETE`. Failure branches:
/// `FAILED` (clean stage), `TRANSFORM_FAILED`, `EDA_FAILED`. Failure states
/// are terminal for the owning workflow attempt but not for the dataset:
/// an operator retrigger may re-enter from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetStatus {
    Uploaded,
    Cleaning,
    Ready,
    Transforming,
    Transformed,
    EdaRunning,
    EdaComplete,
    Failed,
    TransformFailed,
    EdaFailed,
}

impl DatasetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetStatus::Uploaded => "UPLOADED",
            DatasetStatus::Cleaning => "CLEANING",
            DatasetStatus::Ready => "READY",
            DatasetStatus::Transforming => "TRANSFORMING",
            DatasetStatus::Transformed => "TRANSFORMED",
            DatasetStatus::EdaRunning => "EDA_RUNNING",
            DatasetStatus::EdaComplete => "EDA_COMPLETE",
            DatasetStatus::Failed => "FAILED",
            DatasetStatus::TransformFailed => "TRANSFORM_FAILED",
            DatasetStatus::EdaFailed => "EDA_FAILED",
        }
    }
}

impl From<String> for DatasetStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "UPLOADED" => DatasetStatus::Uploaded,
            "CLEANING" => DatasetStatus::Cleaning,
            "READY" => DatasetStatus::Ready,
            "TRANSFORMING" => DatasetStatus::Transforming,
            "TRANSFORMED" => DatasetStatus::Transformed,
            "EDA_RUNNING" => DatasetStatus::EdaRunning,
            "EDA_COMPLETE" => DatasetStatus::EdaComplete,
            "FAILED" => DatasetStatus::Failed,
            "TRANSFORM_FAILED" => DatasetStatus::TransformFailed,
            "EDA_FAILED" => DatasetStatus::EdaFailed,
            _ => DatasetStatus::Uploaded,
        }
    }
}

impl std::fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two workflow definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowKind {
    Clean,
    Transform,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Clean => "CLEAN",
            WorkflowKind::Transform => "TRANSFORM",
        }
    }

    /// The terminal success status the idempotency check looks for
    pub fn expected_terminal_status(&self) -> DatasetStatus {
        match self {
            WorkflowKind::Clean => DatasetStatus::Ready,
            WorkflowKind::Transform => DatasetStatus::EdaComplete,
        }
    }

    /// The canonical success value a completed workflow returns
    pub fn success_value(&self) -> &'static str {
        match self {
            WorkflowKind::Clean => "CLEAN_SUCCESS",
            WorkflowKind::Transform => "EDA_SUCCESS",
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded file undergoing processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Uuid,
    pub file_name: String,
    /// Opaque storage reference (`file://...` or `s3://bucket/key`)
    pub source_location: String,
    pub size_bytes: i64,
    pub status: DatasetStatus,
    /// Identity of the most recent owning workflow instance
    pub workflow_id: Option<String>,
    /// Free-form transformation summary
    pub metadata: Option<serde_json::Value>,
    /// Soft-delete marker; the row is never hard-deleted while referenced
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for registering a newly uploaded dataset
#[derive(Debug, Clone)]
pub struct NewDataset {
    pub file_name: String,
    pub source_location: String,
    pub size_bytes: i64,
}

/// Audit log step outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Started,
    Success,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Started => "STARTED",
            StepStatus::Success => "SUCCESS",
            StepStatus::Failed => "FAILED",
        }
    }
}

impl From<String> for StepStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "STARTED" => StepStatus::Started,
            "SUCCESS" => StepStatus::Success,
            "FAILED" => StepStatus::Failed,
            _ => StepStatus::Started,
        }
    }
}

/// Append-only audit record written by every activity step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub step: String,
    pub status: StepStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// One completed analysis run; the most recent row per dataset is
/// authoritative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub results: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
