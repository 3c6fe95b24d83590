//! Pipeline error taxonomy
//!
//! Activities surface typed errors; the orchestrator classifies them as
//! permanent (not-found, data-quality) or transient (store/storage/stall),
//! retrying only the latter.

use stocklens_common::StocklensError;
use thiserror::Error;
use uuid::Uuid;

/// The pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Clean,
    Transform,
    Eda,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Clean => f.write_str("Cleaning"),
            Stage::Transform => f.write_str("Transformation"),
            Stage::Eda => f.write_str("EDA analysis"),
        }
    }
}

/// Errors surfaced by activities
#[derive(Error, Debug)]
pub enum ActivityError {
    /// The dataset was deleted mid-pipeline; permanent, nothing to roll back
    #[error("Dataset {0} not found - it may have been deleted")]
    NotFound(Uuid),

    /// Malformed or unanalyzable input; permanent for this attempt, made
    /// explicit through a stage-specific rollback status
    #[error("{stage} failed: {message}")]
    DataQuality { stage: Stage, message: String },

    /// State store unavailable or write failed; transient
    #[error("State store error: {0}")]
    Store(#[source] StocklensError),

    /// Object storage unavailable or fetch failed; transient
    #[error("Object storage error: {0}")]
    Storage(#[source] StocklensError),

    /// The activity exceeded its execution window without a heartbeat
    #[error("Activity stalled: no heartbeat within the execution window")]
    Stalled,
}

impl ActivityError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActivityError::Store(_) | ActivityError::Storage(_) | ActivityError::Stalled
        )
    }
}

/// Terminal outcome of a failed workflow instance
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Non-retryable: the operator must retrigger explicitly
    #[error("Permanent failure: {message}")]
    Permanent { message: String },

    /// Retries exhausted on a transient error
    #[error("Workflow failed: {message}")]
    Failed { message: String },
}

/// Errors surfaced by the trigger-facing service layer
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Dataset {0} not found")]
    NotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Common(#[from] StocklensError),
}
