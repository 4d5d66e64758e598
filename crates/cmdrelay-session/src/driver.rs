//! Task driver: runs a job's commands through a session handler and reports
//! every step to the backend.

use std::time::Duration;

use cmdrelay_core::{
    Command, CommandOutcome, HandlerError, HandlerFactory, JobError, JobSpec, LoadOptions,
    ReportError, Reporter, SessionHandler, TaskPhase, TaskStatus,
};
use thiserror::Error;

/// Pause between running a command and reporting it.
pub const DEFAULT_COMMAND_DELAY: Duration = Duration::from_secs(2);

/// Task driver error. Command failures are not errors; they are reported as
/// failed outcomes.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Invalid job: {0}")]
    Validation(#[from] JobError),
    #[error("Backend unreachable: {0}")]
    Transport(#[source] ReportError),
    #[error("Task connect failed: {0}")]
    Connect(#[source] HandlerError),
    #[error("No handler for job: {0}")]
    Handler(#[source] HandlerError),
}

/// Driver settings.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub command_delay: Duration,
    /// Send a terminal `failed` status when the backend stops the task.
    pub report_on_stop: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            command_delay: DEFAULT_COMMAND_DELAY,
            report_on_stop: true,
        }
    }
}

/// Why the backend halted the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopInfo {
    /// Command whose acknowledgment carried the stop.
    pub command_id: String,
    pub detail: String,
}

/// What happened to a task that ran to a terminal phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub task_id: String,
    pub phase: TaskPhase,
    /// Outcomes acknowledged by the backend, in execution order.
    pub reported: Vec<CommandOutcome>,
    pub stopped: Option<StopInfo>,
}

/// Drives one job through its lifecycle.
///
/// `Validating -> Connecting -> Running -> Succeeded | Failed`. The handler is
/// created only after the backend has accepted the `executing` status and is
/// closed on every path once created.
pub struct TaskDriver<R> {
    job: JobSpec,
    reporter: R,
    config: DriverConfig,
    phase: TaskPhase,
}

impl<R: Reporter> TaskDriver<R> {
    #[must_use]
    pub const fn new(job: JobSpec, reporter: R, config: DriverConfig) -> Self {
        Self {
            job,
            reporter,
            config,
            phase: TaskPhase::Validating,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> TaskPhase {
        self.phase
    }

    #[must_use]
    pub const fn job(&self) -> &JobSpec {
        &self.job
    }

    /// Run the task to completion.
    ///
    /// # Errors
    /// Returns error if the backend cannot be reached, no handler can be built
    /// for the job, or the session cannot be established.
    #[tracing::instrument(skip_all, fields(task_id = %self.job.task_id))]
    pub async fn run(mut self, handlers: &dyn HandlerFactory) -> Result<TaskSummary, TaskError> {
        tracing::info!(commands = self.job.commands.len(), "Start executing the task");
        self.reporter
            .report_task_status(&self.job.task_id, TaskStatus::Executing, None)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Task launch failed");
                TaskError::Transport(e)
            })?;

        let mut handler = match handlers.create(&self.job) {
            Ok(handler) => handler,
            Err(e) => {
                tracing::error!(error = %e, "Task has no handler");
                enter(&mut self.phase, TaskPhase::Failed);
                self.report_final(TaskStatus::Failed, Some(&e.to_string())).await;
                return Err(TaskError::Handler(e));
            }
        };

        enter(&mut self.phase, TaskPhase::Connecting);
        let result = self.drive(&mut *handler).await;
        handler.close().await;

        match &result {
            Ok(summary) => tracing::info!(phase = ?summary.phase, "Task finished"),
            Err(e) => tracing::error!(error = %e, "Task aborted"),
        }
        result
    }

    async fn drive(
        &mut self,
        handler: &mut dyn SessionHandler,
    ) -> Result<TaskSummary, TaskError> {
        if let Err(e) = handler.connect().await {
            tracing::error!(error = %e, "Task connect failed");
            enter(&mut self.phase, TaskPhase::Failed);
            self.report_final(TaskStatus::Failed, Some(&e.to_string())).await;
            return Err(TaskError::Connect(e));
        }
        enter(&mut self.phase, TaskPhase::Running);

        let mut reported = Vec::with_capacity(self.job.commands.len());
        for command in &self.job.commands {
            let outcome = run_command(handler, command).await;
            tokio::time::sleep(self.config.command_delay).await;

            let directive = self
                .reporter
                .report_command(&self.job.task_id, &outcome)
                .await
                .map_err(|e| {
                    tracing::error!(command_id = %command.id, error = %e, "Command callback failed");
                    TaskError::Transport(e)
                })?;
            reported.push(outcome);

            if !directive.proceed {
                tracing::warn!(
                    command_id = %command.id,
                    input = %command.value,
                    detail = %directive.detail,
                    "Not allowed to continue executing commands"
                );
                let stop = StopInfo {
                    command_id: command.id.clone(),
                    detail: directive.detail,
                };
                enter(&mut self.phase, TaskPhase::Failed);
                if self.config.report_on_stop {
                    self.report_final(TaskStatus::Failed, Some(&stop.detail)).await;
                }
                return Ok(self.summary(reported, Some(stop)));
            }
        }

        enter(&mut self.phase, TaskPhase::Succeeded);
        self.report_final(TaskStatus::Success, None).await;
        Ok(self.summary(reported, None))
    }

    /// Terminal status reports are best effort; the local outcome stands.
    async fn report_final(&self, status: TaskStatus, reason: Option<&str>) {
        if let Err(e) = self
            .reporter
            .report_task_status(&self.job.task_id, status, reason)
            .await
        {
            tracing::warn!(%status, error = %e, "Final status report failed");
        }
    }

    fn summary(&self, reported: Vec<CommandOutcome>, stopped: Option<StopInfo>) -> TaskSummary {
        TaskSummary {
            task_id: self.job.task_id.clone(),
            phase: self.phase,
            reported,
            stopped,
        }
    }
}

fn enter(phase: &mut TaskPhase, next: TaskPhase) {
    match phase.advance(next) {
        Ok(()) => tracing::debug!(phase = ?next, "Task phase changed"),
        Err(e) => tracing::warn!(error = %e, "Ignoring phase change"),
    }
}

async fn run_command(handler: &mut dyn SessionHandler, command: &Command) -> CommandOutcome {
    if command.is_pause() {
        tracing::debug!(command_id = %command.id, "Pause step");
        return CommandOutcome::paused(&command.id);
    }
    tracing::debug!(command_id = %command.id, index = command.index, "Executing command");
    match handler.execute(&command.value).await {
        Ok(output) => CommandOutcome::success(&command.id, output),
        Err(e) => {
            tracing::warn!(command_id = %command.id, error = %e, "Command failed");
            CommandOutcome::failure(&command.id, e.to_string())
        }
    }
}

/// Decode `input` and run the job it describes.
///
/// The reporter is built only after the job validates, so a malformed job
/// never reaches the backend.
///
/// # Errors
/// See [`TaskError`].
pub async fn run_encoded<R, F>(
    input: &str,
    load_options: &LoadOptions,
    build_reporter: F,
    handlers: &dyn HandlerFactory,
    config: DriverConfig,
) -> Result<TaskSummary, TaskError>
where
    R: Reporter,
    F: FnOnce(&JobSpec) -> R,
{
    let job = JobSpec::decode(input, load_options)?;
    let reporter = build_reporter(&job);
    TaskDriver::new(job, reporter, config).run(handlers).await
}

#[cfg(test)]
mod tests {
    use cmdrelay_core::{BackendContext, HandlerKind, HostAuth};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::{Event, FakeHandlers, FakeReporter, Log};

    fn job(commands: Vec<Command>) -> JobSpec {
        JobSpec {
            task_id: "task-1".into(),
            backend: BackendContext::default(),
            auth: HostAuth::default(),
            kind: HandlerKind::Interactive,
            program: "mysql".into(),
            program_args: Vec::new(),
            commands,
        }
    }

    fn quick() -> DriverConfig {
        DriverConfig {
            command_delay: Duration::ZERO,
            ..DriverConfig::default()
        }
    }

    #[tokio::test]
    async fn test_report_precedes_next_execute() {
        let log = Log::default();
        let commands = vec![Command::new("1", "a", 0), Command::new("2", "b", 1)];
        let summary = TaskDriver::new(job(commands), FakeReporter::new(&log), quick())
            .run(&FakeHandlers::new(&log))
            .await
            .unwrap();

        assert_eq!(summary.phase, TaskPhase::Succeeded);
        assert_eq!(
            log.events(),
            vec![
                Event::Status(TaskStatus::Executing, None),
                Event::Connect,
                Event::Execute("a".into()),
                Event::Report("1".into()),
                Event::Execute("b".into()),
                Event::Report("2".into()),
                Event::Status(TaskStatus::Success, None),
                Event::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_error_is_reported_not_fatal() {
        let log = Log::default();
        let handlers = FakeHandlers::new(&log).failing_on("bad");
        let commands = vec![Command::new("1", "bad", 0), Command::new("2", "good", 1)];
        let summary = TaskDriver::new(job(commands), FakeReporter::new(&log), quick())
            .run(&handlers)
            .await
            .unwrap();

        assert_eq!(summary.phase, TaskPhase::Succeeded);
        assert!(!summary.reported[0].succeeded);
        assert_eq!(summary.reported[0].report_text(), "bad failed");
        assert!(summary.reported[1].succeeded);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let log = Log::default();
        let handlers = FakeHandlers::new(&log).refusing_connect();
        let err = TaskDriver::new(
            job(vec![Command::new("1", "a", 0)]),
            FakeReporter::new(&log),
            quick(),
        )
        .run(&handlers)
        .await
        .unwrap_err();

        assert!(matches!(err, TaskError::Connect(_)));
        assert_eq!(
            log.events(),
            vec![
                Event::Status(TaskStatus::Executing, None),
                Event::Connect,
                Event::Status(TaskStatus::Failed, Some("Connect failed: refused".into())),
                Event::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_launch_report_failure_skips_handler() {
        let log = Log::default();
        let reporter = FakeReporter::new(&log).rejecting_status();
        let err = TaskDriver::new(job(vec![Command::new("1", "a", 0)]), reporter, quick())
            .run(&FakeHandlers::new(&log))
            .await
            .unwrap_err();

        assert!(matches!(err, TaskError::Transport(ReportError::Rejected { .. })));
        assert_eq!(
            log.events(),
            vec![Event::Status(TaskStatus::Executing, None)]
        );
    }

    #[tokio::test]
    async fn test_command_report_failure_closes_handler() {
        let log = Log::default();
        let reporter = FakeReporter::new(&log).unreachable_after(0);
        let commands = vec![Command::new("1", "a", 0), Command::new("2", "b", 1)];
        let err = TaskDriver::new(job(commands), reporter, quick())
            .run(&FakeHandlers::new(&log))
            .await
            .unwrap_err();

        assert!(matches!(err, TaskError::Transport(ReportError::Transport(_))));
        let events = log.events();
        assert!(!events.contains(&Event::Execute("b".into())));
        assert_eq!(events.last(), Some(&Event::Close));
    }

    #[tokio::test]
    async fn test_silent_stop() {
        let log = Log::default();
        let reporter = FakeReporter::new(&log).stopping_at("1", "halt");
        let config = DriverConfig {
            report_on_stop: false,
            ..quick()
        };
        let summary = TaskDriver::new(
            job(vec![Command::new("1", "a", 0), Command::new("2", "b", 1)]),
            reporter,
            config,
        )
        .run(&FakeHandlers::new(&log))
        .await
        .unwrap();

        assert_eq!(summary.phase, TaskPhase::Failed);
        assert_eq!(
            summary.stopped,
            Some(StopInfo {
                command_id: "1".into(),
                detail: "halt".into()
            })
        );
        assert!(
            !log.events()
                .iter()
                .any(|e| matches!(e, Event::Status(TaskStatus::Failed, _)))
        );
    }

    #[tokio::test]
    async fn test_missing_handler() {
        let log = Log::default();
        let handlers = FakeHandlers::new(&log).unavailable();
        let err = TaskDriver::new(job(Vec::new()), FakeReporter::new(&log), quick())
            .run(&handlers)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Handler(_)));
        assert_eq!(
            log.events(),
            vec![
                Event::Status(TaskStatus::Executing, None),
                Event::Status(
                    TaskStatus::Failed,
                    Some("Spawn failed: no such handler".into())
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_job_succeeds() {
        let log = Log::default();
        let summary = TaskDriver::new(job(Vec::new()), FakeReporter::new(&log), quick())
            .run(&FakeHandlers::new(&log))
            .await
            .unwrap();
        assert_eq!(summary.phase, TaskPhase::Succeeded);
        assert!(summary.reported.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_execute_and_report() {
        let log = Log::default();
        let config = DriverConfig {
            command_delay: Duration::from_secs(2),
            ..DriverConfig::default()
        };
        let start = tokio::time::Instant::now();
        TaskDriver::new(
            job(vec![Command::new("1", "a", 0), Command::pause("2", 1)]),
            FakeReporter::new(&log),
            config,
        )
        .run(&FakeHandlers::new(&log))
        .await
        .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(4));
    }
}
