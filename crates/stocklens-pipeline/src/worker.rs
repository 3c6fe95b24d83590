//! Bounded-concurrency workflow execution
//!
//! Workflow instances run as tokio tasks behind a semaphore, so activity
//! work is bounded rather than unbounded. The per-activity watchdog and
//! retry envelope live in the runner; the pool only manages scheduling.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::WorkflowError;
use crate::workflow::{
    ActivityHandler, ExecutionConfig, Journal, RetryPolicy, WorkflowInput, WorkflowRunner,
};

/// Worker pool settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_concurrent_workflows: usize,
    pub retry: RetryPolicy,
    pub execution: ExecutionConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workflows: 10,
            retry: RetryPolicy::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

/// Handle to a submitted workflow instance
#[derive(Debug)]
pub struct WorkflowHandle {
    pub workflow_id: String,
    handle: JoinHandle<Result<String, WorkflowError>>,
}

impl WorkflowHandle {
    /// Await the workflow's terminal result
    pub async fn join(self) -> Result<String, WorkflowError> {
        self.handle.await.unwrap_or_else(|e| {
            Err(WorkflowError::Failed {
                message: format!("Workflow task aborted: {e}"),
            })
        })
    }
}

/// Runs workflow instances with bounded concurrency
pub struct WorkerPool {
    runner: Arc<WorkflowRunner>,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(handler: Arc<dyn ActivityHandler>, config: WorkerConfig) -> Self {
        Self {
            runner: Arc::new(WorkflowRunner::new(
                handler,
                config.retry,
                config.execution,
            )),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_workflows.max(1))),
        }
    }

    /// Submit a workflow instance; it starts as soon as a slot frees up
    pub fn submit(&self, input: WorkflowInput) -> WorkflowHandle {
        let workflow_id = input.workflow_id.clone();
        let runner = self.runner.clone();
        let semaphore = self.semaphore.clone();

        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.map_err(|_| {
                WorkflowError::Failed {
                    message: "Worker pool shut down".to_string(),
                }
            })?;

            let mut journal = Journal::new();
            let result = runner.run(&input, &mut journal).await;
            match &result {
                Ok(value) => {
                    info!(workflow_id = %input.workflow_id, result = %value, "Workflow finished")
                }
                Err(e) => error!(workflow_id = %input.workflow_id, error = %e, "Workflow failed"),
            }
            result
        });

        WorkflowHandle {
            workflow_id,
            handle,
        }
    }
}
