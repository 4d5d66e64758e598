//! Handler configuration and kind dispatch.

use std::{sync::Arc, time::Duration};

use cmdrelay_core::{HandlerError, HandlerFactory, HandlerKind, JobSpec, SessionHandler};
use cmdrelay_pty::TermSize;

use crate::{
    boundary::{BoundaryPolicy, DEFAULT_PROMPT, PromptMarker, Sentinel},
    direct::DirectHandler,
    interactive::InteractiveHandler,
};

/// Default bound on session startup.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How interactive command output is delimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BoundaryMode {
    /// Match the program's prompt.
    #[default]
    Prompt,
    /// Print a unique sentinel after every command.
    Sentinel,
}

/// Settings for interactive sessions.
#[derive(Debug, Clone)]
pub struct InteractiveConfig {
    pub prompt: String,
    pub boundary: BoundaryMode,
    pub connect_timeout: Duration,
    pub term_size: TermSize,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            boundary: BoundaryMode::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            term_size: TermSize::default(),
        }
    }
}

impl InteractiveConfig {
    /// Build the boundary policy for one session.
    #[must_use]
    pub fn policy(&self) -> Arc<dyn BoundaryPolicy> {
        match self.boundary {
            BoundaryMode::Prompt => Arc::new(PromptMarker::new(self.prompt.clone())),
            BoundaryMode::Sentinel => Arc::new(Sentinel::new(self.prompt.clone())),
        }
    }
}

/// Settings for direct database sessions.
#[derive(Debug, Clone)]
pub struct DirectConfig {
    pub connect_timeout: Duration,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Handler settings; also the factory that maps a job to its handler.
#[derive(Debug, Clone, Default)]
pub struct HandlerConfig {
    pub interactive: InteractiveConfig,
    pub direct: DirectConfig,
}

impl HandlerFactory for HandlerConfig {
    fn create(&self, job: &JobSpec) -> Result<Box<dyn SessionHandler>, HandlerError> {
        Ok(handler_for(job, self))
    }
}

/// Select the handler variant for `job.kind`.
#[must_use]
pub fn handler_for(job: &JobSpec, config: &HandlerConfig) -> Box<dyn SessionHandler> {
    match job.kind {
        HandlerKind::Interactive => Box::new(InteractiveHandler::new(
            job.program.clone(),
            job.program_args.clone(),
            &config.interactive,
        )),
        HandlerKind::Direct => Box::new(
            DirectHandler::new(job.auth.clone())
                .with_connect_timeout(config.direct.connect_timeout),
        ),
    }
}
