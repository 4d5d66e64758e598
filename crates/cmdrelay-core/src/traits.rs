//! Core traits for session handlers and backend reporting.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CommandOutcome, JobSpec, TaskStatus};

/// Session handler error.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),
    #[error("Timed out after {0:?} waiting for the session prompt")]
    PromptTimeout(std::time::Duration),
    #[error("Connect failed: {0}")]
    ConnectFailed(String),
    #[error("{0}")]
    ExecutionFailed(String),
    #[error("Session is not connected")]
    NotConnected,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A live session against a target backend.
///
/// Handlers are driven strictly sequentially: `connect`, any number of
/// `execute` calls, then `close`. `close` must be idempotent and safe on a
/// handler that never connected.
#[async_trait]
pub trait SessionHandler: Send {
    /// Establish the session.
    async fn connect(&mut self) -> Result<(), HandlerError>;

    /// Run one command and return its buffered output.
    async fn execute(&mut self, command: &str) -> Result<String, HandlerError>;

    /// Release the session.
    async fn close(&mut self);
}

/// Creates the session handler for a job's [`HandlerKind`](crate::HandlerKind).
pub trait HandlerFactory: Send + Sync {
    /// Build an unconnected handler.
    ///
    /// # Errors
    /// Returns error if the job cannot be served by any handler.
    fn create(&self, job: &JobSpec) -> Result<Box<dyn SessionHandler>, HandlerError>;
}

/// Continue/stop instruction returned with a command acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    /// Whether the remaining commands may run.
    #[serde(rename = "status")]
    pub proceed: bool,
    /// Explanation from the backend.
    #[serde(default)]
    pub detail: String,
}

impl Directive {
    #[must_use]
    pub fn proceed() -> Self {
        Self {
            proceed: true,
            detail: String::new(),
        }
    }

    #[must_use]
    pub fn stop(detail: impl Into<String>) -> Self {
        Self {
            proceed: false,
            detail: detail.into(),
        }
    }
}

/// Reporting error. Any of these means the backend could not be told.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("{body}")]
    Rejected { status: u16, body: String },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

/// Narrow interface to the orchestration server.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Report a task lifecycle change. Single attempt.
    async fn report_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        reason: Option<&str>,
    ) -> Result<(), ReportError>;

    /// Report one command outcome and learn whether to continue.
    async fn report_command(
        &self,
        task_id: &str,
        outcome: &CommandOutcome,
    ) -> Result<Directive, ReportError>;

    /// Best-effort liveness ping. Never fails the task.
    async fn report_health(&self, task_id: &str);
}

#[async_trait]
impl<R: Reporter + ?Sized> Reporter for std::sync::Arc<R> {
    async fn report_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        reason: Option<&str>,
    ) -> Result<(), ReportError> {
        (**self).report_task_status(task_id, status, reason).await
    }

    async fn report_command(
        &self,
        task_id: &str,
        outcome: &CommandOutcome,
    ) -> Result<Directive, ReportError> {
        (**self).report_command(task_id, outcome).await
    }

    async fn report_health(&self, task_id: &str) {
        (**self).report_health(task_id).await;
    }
}

#[async_trait]
impl<H: SessionHandler + ?Sized> SessionHandler for Box<H> {
    async fn connect(&mut self) -> Result<(), HandlerError> {
        (**self).connect().await
    }

    async fn execute(&mut self, command: &str) -> Result<String, HandlerError> {
        (**self).execute(command).await
    }

    async fn close(&mut self) {
        (**self).close().await;
    }
}
