//! Job data model.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::BackendContext;

/// How a command is treated by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCategory {
    /// Sent to the session handler.
    #[default]
    Normal,
    /// Placeholder step; never reaches the handler.
    Pause,
}

impl CommandCategory {
    /// Parse a category string. Anything other than `pause` is a normal command.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("pause") {
            Self::Pause
        } else {
            Self::Normal
        }
    }
}

impl<'de> Deserialize<'de> for CommandCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(Self::Normal, Self::parse))
    }
}

/// One step of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    /// Text sent to the session.
    #[serde(rename = "input", default)]
    pub value: String,
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub category: CommandCategory,
}

impl Command {
    /// Create a normal command.
    #[must_use]
    pub fn new(id: impl Into<String>, value: impl Into<String>, index: i64) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            index,
            category: CommandCategory::Normal,
        }
    }

    /// Create a pause step.
    #[must_use]
    pub fn pause(id: impl Into<String>, index: i64) -> Self {
        Self {
            id: id.into(),
            value: String::new(),
            index,
            category: CommandCategory::Pause,
        }
    }

    #[must_use]
    pub fn is_pause(&self) -> bool {
        self.category == CommandCategory::Pause
    }
}

/// Credentials for the direct handler.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAuth {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub db_name: String,
}

impl fmt::Debug for HostAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostAuth")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("db_name", &self.db_name)
            .finish()
    }
}

/// Which session handler variant a job runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// Interactive program driven through a pseudo-terminal.
    Interactive,
    /// Direct MySQL connection.
    Direct,
}

impl HandlerKind {
    /// Map the envelope's `cmd_type` tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "script" => Some(Self::Interactive),
            "mysql" => Some(Self::Direct),
            _ => None,
        }
    }
}

/// Fully decoded description of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub task_id: String,
    pub backend: BackendContext,
    pub auth: HostAuth,
    pub kind: HandlerKind,
    /// Interactive program to spawn.
    pub program: String,
    pub program_args: Vec<String>,
    pub commands: Vec<Command>,
}

/// Result of one executed (or paused) command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command_id: String,
    pub succeeded: bool,
    pub output: String,
    pub error: Option<String>,
}

impl CommandOutcome {
    #[must_use]
    pub fn success(command_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
            succeeded: true,
            output: output.into(),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(command_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
            succeeded: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Outcome of a pause step.
    #[must_use]
    pub fn paused(command_id: impl Into<String>) -> Self {
        Self::success(command_id, "")
    }

    /// Text sent to the backend: the output, or the error on failure.
    #[must_use]
    pub fn report_text(&self) -> &str {
        match (&self.error, self.succeeded) {
            (Some(err), false) => err,
            _ => &self.output,
        }
    }
}

/// Lifecycle status as understood by the orchestration server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task accepted and started.
    Executing,
    Failed,
    Success,
}

impl TaskStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Executing => "executing",
            Self::Failed => "failed",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Driver phase. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Validating,
    Connecting,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid phase transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: TaskPhase,
    pub to: TaskPhase,
}

impl TaskPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Move to `next`.
    ///
    /// # Errors
    /// Returns error when leaving a terminal phase or moving backwards.
    pub fn advance(&mut self, next: Self) -> Result<(), InvalidTransition> {
        if self.is_terminal() || next <= *self {
            return Err(InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }
}
