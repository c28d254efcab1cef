//! Hand-off of accepted submissions to the workflow engine.
//!
//! The engine itself is external. [`WorkflowDispatcher`] is the seam: it
//! starts a run with the [`ResponseRecord`], returns the workflow's answer
//! for deferred response modes, and reports execution status for the page's
//! polling loop.

use async_trait::async_trait;
use form_trigger_core::{ExecutionMode, HttpReply, ResponseMode, ResponseRecord};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};
use tracing::{debug, info};

/// One workflow run to start
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRun {
    /// Path of the form that accepted the submission
    pub form_path: String,

    pub node_name: String,
    pub execution_mode: ExecutionMode,
    pub response_mode: ResponseMode,
    pub record: ResponseRecord,
}

/// Execution status reported to the polling form page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// No execution is known for the form
    Unknown,
    Running,
    Waiting,
    Success,
    Canceled,
    Crashed,
    Error,

    /// The workflow paused on a page the client should continue on
    Resume { url: String },
}

impl ExecutionStatus {
    /// Plain-text body of the status endpoint
    pub fn as_text(&self) -> &str {
        match self {
            Self::Unknown => "null",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Success => "success",
            Self::Canceled => "canceled",
            Self::Crashed => "crashed",
            Self::Error => "error",
            Self::Resume { url } => url,
        }
    }
}

/// Errors reaching or running the workflow
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error("Workflow engine unavailable: {message}")]
    Unavailable { message: String },

    #[error("Workflow execution failed: {message}")]
    ExecutionFailed { message: String },
}

/// Interface to the workflow engine
#[async_trait]
pub trait WorkflowDispatcher: Send + Sync {
    /// Start a run and return the workflow's reply
    ///
    /// For `onReceived` forms the reply is discarded; the client has already
    /// been answered.
    async fn dispatch(&self, run: WorkflowRun) -> Result<HttpReply, DispatchError>;

    /// Status of the latest run started from a form
    async fn execution_status(
        &self,
        form_path: &str,
        execution_mode: ExecutionMode,
    ) -> Result<ExecutionStatus, DispatchError>;
}

// ============================================================================
// In-memory dispatcher
// ============================================================================

type StatusKey = (String, ExecutionMode);

/// Number of completed runs kept for inspection unless configured otherwise
pub const DEFAULT_RUN_HISTORY: usize = 100;

/// Dispatcher that records runs and completes them immediately
///
/// Each run finishes with [`ExecutionStatus::Success`]. The reply is the one
/// set with [`InMemoryDispatcher::with_reply`], or else the record itself as
/// JSON, which is what a workflow whose last node is the trigger returns.
///
/// Only the most recent runs are kept (see [`with_run_history`]); statuses
/// are kept per form and execution mode.
///
/// [`with_run_history`]: InMemoryDispatcher::with_run_history
#[derive(Clone)]
pub struct InMemoryDispatcher {
    runs: Arc<Mutex<VecDeque<WorkflowRun>>>,
    statuses: Arc<Mutex<HashMap<StatusKey, ExecutionStatus>>>,
    reply: Option<HttpReply>,
    run_history: usize,
}

impl Default for InMemoryDispatcher {
    fn default() -> Self {
        Self {
            runs: Arc::default(),
            statuses: Arc::default(),
            reply: None,
            run_history: DEFAULT_RUN_HISTORY,
        }
    }
}

impl InMemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` completed runs; older runs are dropped first
    pub fn with_run_history(mut self, limit: usize) -> Self {
        self.run_history = limit;
        self
    }

    /// Answer every run with `reply`
    pub fn with_reply(mut self, reply: HttpReply) -> Self {
        self.reply = Some(reply);
        self
    }

    /// Retained runs, oldest first
    pub fn runs(&self) -> Vec<WorkflowRun> {
        self.runs
            .lock()
            .map(|runs| runs.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().map(|runs| runs.len()).unwrap_or(0)
    }

    /// Override the status reported for a form
    pub fn set_status(
        &self,
        form_path: &str,
        execution_mode: ExecutionMode,
        status: ExecutionStatus,
    ) -> Result<(), DispatchError> {
        self.statuses
            .lock()
            .map_err(|_| poisoned())?
            .insert((form_path.to_string(), execution_mode), status);
        Ok(())
    }
}

#[async_trait]
impl WorkflowDispatcher for InMemoryDispatcher {
    async fn dispatch(&self, run: WorkflowRun) -> Result<HttpReply, DispatchError> {
        let reply = match &self.reply {
            Some(reply) => reply.clone(),
            None => {
                let body = serde_json::to_value(&run.record).map_err(|e| {
                    DispatchError::ExecutionFailed {
                        message: e.to_string(),
                    }
                })?;
                HttpReply::json(200, body)
            }
        };

        info!(
            form_path = %run.form_path,
            node_name = %run.node_name,
            execution_mode = %run.execution_mode,
            "Workflow run completed"
        );

        self.statuses.lock().map_err(|_| poisoned())?.insert(
            (run.form_path.clone(), run.execution_mode),
            ExecutionStatus::Success,
        );
        let mut runs = self.runs.lock().map_err(|_| poisoned())?;
        runs.push_back(run);
        while runs.len() > self.run_history {
            runs.pop_front();
        }

        Ok(reply)
    }

    async fn execution_status(
        &self,
        form_path: &str,
        execution_mode: ExecutionMode,
    ) -> Result<ExecutionStatus, DispatchError> {
        let status = self
            .statuses
            .lock()
            .map_err(|_| poisoned())?
            .get(&(form_path.to_string(), execution_mode))
            .cloned()
            .unwrap_or(ExecutionStatus::Unknown);

        debug!(form_path, status = status.as_text(), "Execution status requested");
        Ok(status)
    }
}

impl std::fmt::Debug for InMemoryDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDispatcher")
            .field("runs", &self.run_count())
            .field("run_history", &self.run_history)
            .field("reply", &self.reply.as_ref().map(|reply| reply.status))
            .finish()
    }
}

fn poisoned() -> DispatchError {
    DispatchError::Unavailable {
        message: "dispatcher state lock poisoned".to_string(),
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
