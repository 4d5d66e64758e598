//! Recording fakes for driver tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use cmdrelay_core::{
    CommandOutcome, Directive, HandlerError, HandlerFactory, JobSpec, ReportError, Reporter,
    SessionHandler, TaskStatus,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Status(TaskStatus, Option<String>),
    Connect,
    Execute(String),
    Report(String),
    Close,
}

/// Shared, ordered event log.
#[derive(Debug, Clone, Default)]
pub struct Log(Arc<Mutex<Vec<Event>>>);

impl Log {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }
}

pub struct FakeReporter {
    log: Log,
    reject_status: bool,
    unreachable_after: Option<usize>,
    stop_at: Option<(String, String)>,
    commands_seen: AtomicUsize,
}

impl FakeReporter {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            reject_status: false,
            unreachable_after: None,
            stop_at: None,
            commands_seen: AtomicUsize::new(0),
        }
    }

    pub fn rejecting_status(mut self) -> Self {
        self.reject_status = true;
        self
    }

    /// Fail command reports once `n` have been acknowledged.
    pub fn unreachable_after(mut self, n: usize) -> Self {
        self.unreachable_after = Some(n);
        self
    }

    pub fn stopping_at(mut self, command_id: &str, detail: &str) -> Self {
        self.stop_at = Some((command_id.to_string(), detail.to_string()));
        self
    }
}

#[async_trait]
impl Reporter for FakeReporter {
    async fn report_task_status(
        &self,
        _task_id: &str,
        status: TaskStatus,
        reason: Option<&str>,
    ) -> Result<(), ReportError> {
        self.log
            .push(Event::Status(status, reason.map(str::to_string)));
        if self.reject_status {
            return Err(ReportError::Rejected {
                status: 403,
                body: "forbidden".into(),
            });
        }
        Ok(())
    }

    async fn report_command(
        &self,
        _task_id: &str,
        outcome: &CommandOutcome,
    ) -> Result<Directive, ReportError> {
        let seen = self.commands_seen.fetch_add(1, Ordering::SeqCst);
        if self.unreachable_after.is_some_and(|n| seen >= n) {
            return Err(ReportError::Transport("connection refused".into()));
        }
        self.log.push(Event::Report(outcome.command_id.clone()));
        match &self.stop_at {
            Some((id, detail)) if *id == outcome.command_id => Ok(Directive::stop(detail.clone())),
            _ => Ok(Directive::proceed()),
        }
    }

    async fn report_health(&self, _task_id: &str) {}
}

#[derive(Default)]
pub struct FakeHandlers {
    log: Log,
    fail_on: Option<String>,
    refuse_connect: bool,
    unavailable: bool,
}

impl FakeHandlers {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            ..Self::default()
        }
    }

    /// Commands equal to `input` fail to execute.
    pub fn failing_on(mut self, input: &str) -> Self {
        self.fail_on = Some(input.to_string());
        self
    }

    pub fn refusing_connect(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }
}

impl HandlerFactory for FakeHandlers {
    fn create(&self, _job: &JobSpec) -> Result<Box<dyn SessionHandler>, HandlerError> {
        if self.unavailable {
            return Err(HandlerError::SpawnFailed("no such handler".into()));
        }
        Ok(Box::new(FakeHandler {
            log: self.log.clone(),
            fail_on: self.fail_on.clone(),
            refuse_connect: self.refuse_connect,
        }))
    }
}

struct FakeHandler {
    log: Log,
    fail_on: Option<String>,
    refuse_connect: bool,
}

#[async_trait]
impl SessionHandler for FakeHandler {
    async fn connect(&mut self) -> Result<(), HandlerError> {
        self.log.push(Event::Connect);
        if self.refuse_connect {
            return Err(HandlerError::ConnectFailed("refused".into()));
        }
        Ok(())
    }

    async fn execute(&mut self, command: &str) -> Result<String, HandlerError> {
        self.log.push(Event::Execute(command.to_string()));
        if self.fail_on.as_deref() == Some(command) {
            return Err(HandlerError::ExecutionFailed(format!("{command} failed")));
        }
        Ok(format!("ran {command}"))
    }

    async fn close(&mut self) {
        self.log.push(Event::Close);
    }
}
