//! Pure workflow state transitions
//!
//! [`next_action`] maps a workflow's input plus the ordered history of
//! activity outcomes to the next action. It never performs I/O, which is
//! what makes a workflow instance safely replayable: feed the same history
//! back in and the same decisions come out.

use serde_json::Value;
use uuid::Uuid;

use crate::activity::WorkflowStateCheck;
use crate::error::Stage;
use crate::model::{DatasetStatus, WorkflowKind};

/// Parameters of one workflow instance
#[derive(Debug, Clone)]
pub struct WorkflowInput {
    pub kind: WorkflowKind,
    /// Caller-supplied idempotency key
    pub workflow_id: String,
    pub dataset_id: Uuid,
    pub transformations: Vec<Value>,
}

/// One activity invocation with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityCall {
    CheckState {
        dataset_id: Uuid,
        kind: WorkflowKind,
        workflow_id: String,
    },
    Clean {
        dataset_id: Uuid,
        workflow_id: String,
    },
    Transform {
        dataset_id: Uuid,
        workflow_id: String,
        transformations: Vec<Value>,
    },
    PerformEda {
        dataset_id: Uuid,
        workflow_id: String,
    },
    Rollback {
        dataset_id: Uuid,
        failure_status: DatasetStatus,
    },
}

impl ActivityCall {
    pub fn name(&self) -> &'static str {
        match self {
            ActivityCall::CheckState { .. } => "check_workflow_state",
            ActivityCall::Clean { .. } => "clean_dataset",
            ActivityCall::Transform { .. } => "transform_dataset",
            ActivityCall::PerformEda { .. } => "perform_eda",
            ActivityCall::Rollback { .. } => "rollback_dataset",
        }
    }
}

/// Classified failure recorded after activity-level retries are exhausted
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    NotFound { message: String },
    DataQuality { stage: Stage, message: String },
    Transient { message: String },
}

/// Recorded result of one activity invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityOutcome {
    StateCheck(WorkflowStateCheck),
    Completed(String),
    RolledBack,
    Failed(FailureKind),
}

/// What the runner should do next
#[derive(Debug, Clone, PartialEq)]
pub enum NextAction {
    Run(ActivityCall),
    Complete(&'static str),
    Fail {
        message: String,
        /// Failure status to roll the dataset back to, when the stage
        /// demands one
        rollback: Option<DatasetStatus>,
        /// Permanent failures must not be retried at any level; the
        /// operator retriggers explicitly
        permanent: bool,
    },
}

/// The state transition function: `(input, history) -> next action`
pub fn next_action(input: &WorkflowInput, history: &[ActivityOutcome]) -> NextAction {
    if let Some(ActivityOutcome::Failed(failure)) = history.last() {
        return classify_failure(failure);
    }

    match input.kind {
        WorkflowKind::Clean => match history {
            [] => NextAction::Run(check_state(input)),
            [ActivityOutcome::StateCheck(check)] if check.already_processed => {
                NextAction::Complete(WorkflowKind::Clean.success_value())
            }
            [ActivityOutcome::StateCheck(_)] => NextAction::Run(ActivityCall::Clean {
                dataset_id: input.dataset_id,
                workflow_id: input.workflow_id.clone(),
            }),
            [ActivityOutcome::StateCheck(_), ActivityOutcome::Completed(_)] => {
                NextAction::Complete(WorkflowKind::Clean.success_value())
            }
            _ => invalid_history(input, history),
        },
        WorkflowKind::Transform => match history {
            [] => NextAction::Run(check_state(input)),
            [ActivityOutcome::StateCheck(check)] if check.already_processed => {
                NextAction::Complete(WorkflowKind::Transform.success_value())
            }
            [ActivityOutcome::StateCheck(_)] => NextAction::Run(ActivityCall::Transform {
                dataset_id: input.dataset_id,
                workflow_id: input.workflow_id.clone(),
                transformations: input.transformations.clone(),
            }),
            [ActivityOutcome::StateCheck(_), ActivityOutcome::Completed(_)] => {
                NextAction::Run(ActivityCall::PerformEda {
                    dataset_id: input.dataset_id,
                    workflow_id: input.workflow_id.clone(),
                })
            }
            [ActivityOutcome::StateCheck(_), ActivityOutcome::Completed(_), ActivityOutcome::Completed(_)] => {
                NextAction::Complete(WorkflowKind::Transform.success_value())
            }
            _ => invalid_history(input, history),
        },
    }
}

fn check_state(input: &WorkflowInput) -> ActivityCall {
    ActivityCall::CheckState {
        dataset_id: input.dataset_id,
        kind: input.kind,
        workflow_id: input.workflow_id.clone(),
    }
}

fn classify_failure(failure: &FailureKind) -> NextAction {
    match failure {
        FailureKind::NotFound { message } => NextAction::Fail {
            message: format!("Permanent failure: {message}"),
            rollback: None,
            permanent: true,
        },
        FailureKind::DataQuality {
            stage: Stage::Transform,
            message,
        } => NextAction::Fail {
            message: format!("Transformation failed: {message}"),
            rollback: Some(DatasetStatus::TransformFailed),
            permanent: true,
        },
        FailureKind::DataQuality {
            stage: Stage::Eda,
            message,
        } => NextAction::Fail {
            message: format!("EDA analysis failed: {message}"),
            rollback: Some(DatasetStatus::EdaFailed),
            permanent: true,
        },
        // The clean activity already marked the dataset FAILED itself
        FailureKind::DataQuality {
            stage: Stage::Clean,
            message,
        } => NextAction::Fail {
            message: format!("Cleaning failed: {message}"),
            rollback: None,
            permanent: true,
        },
        FailureKind::Transient { message } => NextAction::Fail {
            message: message.clone(),
            rollback: None,
            permanent: false,
        },
    }
}

fn invalid_history(input: &WorkflowInput, history: &[ActivityOutcome]) -> NextAction {
    NextAction::Fail {
        message: format!(
            "Invalid workflow history for {} workflow ({} outcomes recorded)",
            input.kind,
            history.len()
        ),
        rollback: None,
        permanent: true,
    }
}
