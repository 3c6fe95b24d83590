//! Workflow runner
//!
//! Drives the pure decider against an activity handler, recording every
//! activity result in a journal. Re-running with the same journal replays
//! recorded outcomes instead of re-invoking activities, which is how a
//! workflow resumes deterministically after a process restart.
//!
//! The runner also owns the activity execution envelope: per-call retry
//! with backoff for transient errors, and a watchdog that treats a missed
//! heartbeat or an exceeded execution window as a retryable stall.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::activity::{Activities, Heartbeat};
use crate::error::{ActivityError, WorkflowError};
use crate::workflow::decider::{
    next_action, ActivityCall, ActivityOutcome, FailureKind, NextAction, WorkflowInput,
};
use crate::workflow::retry::RetryPolicy;

/// Execution bounds for a single activity attempt
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Hard ceiling on one attempt's duration
    pub start_to_close_timeout: Duration,
    /// A stalled attempt is one that goes this long without a heartbeat
    pub heartbeat_timeout: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            start_to_close_timeout: Duration::from_secs(30 * 60),
            heartbeat_timeout: Duration::from_secs(120),
        }
    }
}

/// Executes one activity call; the production implementation is
/// [`Activities`], tests substitute their own
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    async fn handle(
        &self,
        call: &ActivityCall,
        heartbeat: Heartbeat,
    ) -> Result<ActivityOutcome, ActivityError>;
}

#[async_trait]
impl ActivityHandler for Activities {
    async fn handle(
        &self,
        call: &ActivityCall,
        heartbeat: Heartbeat,
    ) -> Result<ActivityOutcome, ActivityError> {
        match call {
            ActivityCall::CheckState {
                dataset_id,
                kind,
                workflow_id,
            } => Ok(ActivityOutcome::StateCheck(
                self.check_workflow_state(*dataset_id, *kind, workflow_id)
                    .await,
            )),
            ActivityCall::Clean {
                dataset_id,
                workflow_id,
            } => self
                .clean_dataset(*dataset_id, workflow_id, &heartbeat)
                .await
                .map(|v| ActivityOutcome::Completed(v.to_string())),
            ActivityCall::Transform {
                dataset_id,
                workflow_id,
                transformations,
            } => self
                .transform_dataset(*dataset_id, workflow_id, transformations, &heartbeat)
                .await
                .map(|v| ActivityOutcome::Completed(v.to_string())),
            ActivityCall::PerformEda {
                dataset_id,
                workflow_id,
            } => self
                .perform_eda(*dataset_id, workflow_id, &heartbeat)
                .await
                .map(|v| ActivityOutcome::Completed(v.to_string())),
            ActivityCall::Rollback {
                dataset_id,
                failure_status,
            } => self
                .rollback_dataset(*dataset_id, *failure_status)
                .await
                .map(|_| ActivityOutcome::RolledBack),
        }
    }
}

/// One recorded activity invocation
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub call: ActivityCall,
    pub outcome: ActivityOutcome,
}

/// Ordered log of activity results for one workflow instance
#[derive(Debug, Clone, Default)]
pub struct Journal {
    pub entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Drives workflow instances to completion
pub struct WorkflowRunner {
    handler: Arc<dyn ActivityHandler>,
    retry: RetryPolicy,
    execution: ExecutionConfig,
}

impl WorkflowRunner {
    pub fn new(
        handler: Arc<dyn ActivityHandler>,
        retry: RetryPolicy,
        execution: ExecutionConfig,
    ) -> Self {
        Self {
            handler,
            retry,
            execution,
        }
    }

    /// Run one workflow instance to a terminal result
    ///
    /// Journaled results are replayed without re-invoking their activities;
    /// execution resumes at the first unrecorded call.
    pub async fn run(
        &self,
        input: &WorkflowInput,
        journal: &mut Journal,
    ) -> Result<String, WorkflowError> {
        info!(
            workflow_id = %input.workflow_id,
            dataset_id = %input.dataset_id,
            kind = %input.kind,
            replayed = journal.len(),
            "Workflow started"
        );

        let mut history: Vec<ActivityOutcome> = Vec::new();
        let mut cursor = 0usize;

        loop {
            match next_action(input, &history) {
                NextAction::Run(call) => {
                    let outcome = self.resolve(call, journal, &mut cursor).await;
                    history.push(outcome);
                }
                NextAction::Complete(value) => {
                    info!(workflow_id = %input.workflow_id, result = value, "Workflow completed");
                    return Ok(value.to_string());
                }
                NextAction::Fail {
                    message,
                    rollback,
                    permanent,
                } => {
                    if let Some(failure_status) = rollback {
                        let call = ActivityCall::Rollback {
                            dataset_id: input.dataset_id,
                            failure_status,
                        };
                        match self.resolve(call, journal, &mut cursor).await {
                            ActivityOutcome::RolledBack => {
                                info!(workflow_id = %input.workflow_id, status = %failure_status, "Dataset rolled back");
                            }
                            other => {
                                // Never mask the original failure
                                error!(workflow_id = %input.workflow_id, outcome = ?other, "Rollback failed");
                            }
                        }
                    }

                    error!(workflow_id = %input.workflow_id, message = %message, permanent, "Workflow failed");
                    return Err(if permanent {
                        WorkflowError::Permanent { message }
                    } else {
                        WorkflowError::Failed { message }
                    });
                }
            }
        }
    }

    /// Replay a journaled outcome, or execute the call and record it
    async fn resolve(
        &self,
        call: ActivityCall,
        journal: &mut Journal,
        cursor: &mut usize,
    ) -> ActivityOutcome {
        if let Some(entry) = journal.entries.get(*cursor) {
            if entry.call == call {
                let outcome = entry.outcome.clone();
                *cursor += 1;
                debug!(activity = call.name(), "Replayed journaled result");
                return outcome;
            }
            // The journal no longer matches the decider; the stale suffix
            // cannot be trusted
            warn!(activity = call.name(), "Journal diverged, discarding stale entries");
            journal.entries.truncate(*cursor);
        }

        let outcome = self.execute(&call).await;
        journal.entries.push(JournalEntry {
            call,
            outcome: outcome.clone(),
        });
        *cursor += 1;
        outcome
    }

    /// Execute one activity with retry and stall detection
    async fn execute(&self, call: &ActivityCall) -> ActivityOutcome {
        let mut attempt = 1u32;
        loop {
            match self.execute_once(call).await {
                Ok(outcome) => return outcome,
                Err(e) if e.is_retryable() && attempt < self.retry.maximum_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        activity = call.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Activity failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(activity = call.name(), attempt, error = %e, "Activity failed permanently");
                    return ActivityOutcome::Failed(classify(e));
                }
            }
        }
    }

    /// One attempt under the watchdog: the activity must either finish
    /// within the execution window or keep heartbeating
    async fn execute_once(&self, call: &ActivityCall) -> Result<ActivityOutcome, ActivityError> {
        let (heartbeat, mut beats) = Heartbeat::channel();

        let fut = self.handler.handle(call, heartbeat);
        tokio::pin!(fut);

        let overall = tokio::time::sleep(self.execution.start_to_close_timeout);
        tokio::pin!(overall);
        let stall = tokio::time::sleep(self.execution.heartbeat_timeout);
        tokio::pin!(stall);

        let mut beats_open = true;
        loop {
            tokio::select! {
                result = &mut fut => return result,
                _ = &mut overall => return Err(ActivityError::Stalled),
                _ = &mut stall => return Err(ActivityError::Stalled),
                signal = beats.recv(), if beats_open => {
                    match signal {
                        Some(signal) => {
                            debug!(step = %signal.step, progress = signal.progress, total = signal.total, "Activity heartbeat");
                            stall.as_mut().reset(
                                tokio::time::Instant::now() + self.execution.heartbeat_timeout,
                            );
                        }
                        None => beats_open = false,
                    }
                }
            }
        }
    }
}

fn classify(error: ActivityError) -> FailureKind {
    let message = error.to_string();
    match error {
        ActivityError::NotFound(_) => FailureKind::NotFound { message },
        ActivityError::DataQuality { stage, message } => FailureKind::DataQuality { stage, message },
        ActivityError::Store(_) | ActivityError::Storage(_) | ActivityError::Stalled => {
            FailureKind::Transient { message }
        }
    }
}
