//! Wire protocol for the orchestration server's execution callbacks.

use std::time::{SystemTime, UNIX_EPOCH};

use cmdrelay_core::{CommandOutcome, TaskStatus};
use serde::{Deserialize, Serialize};

/// Reason sent when a status change has none.
pub const NO_REASON: &str = "-";

/// Callback flavour, sent as the `type` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Status,
    Command,
    Health,
}

impl CallbackKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Command => "command",
            Self::Health => "health",
        }
    }
}

/// Path of an execution callback, relative to the backend host.
#[must_use]
pub fn callback_path(task_id: &str, kind: CallbackKind) -> String {
    format!("/api/v1/behemoth/executions/{task_id}/?type={}", kind.as_str())
}

/// Task lifecycle change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: TaskStatus,
    pub reason: String,
}

impl StatusUpdate {
    #[must_use]
    pub fn new(status: TaskStatus, reason: Option<&str>) -> Self {
        Self {
            status,
            reason: reason.unwrap_or(NO_REASON).to_string(),
        }
    }
}

/// Per-command result flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Success,
    Failed,
}

/// Result of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCallback {
    pub command_id: String,
    /// Unix seconds.
    pub timestamp: u64,
    pub status: CommandStatus,
    /// Command output, or the error text on failure.
    pub output: String,
}

impl CommandCallback {
    #[must_use]
    pub fn new(outcome: &CommandOutcome, timestamp: u64) -> Self {
        Self {
            command_id: outcome.command_id.clone(),
            timestamp,
            status: if outcome.succeeded {
                CommandStatus::Success
            } else {
                CommandStatus::Failed
            },
            output: outcome.report_text().to_string(),
        }
    }

    /// Stamp with the current time.
    #[must_use]
    pub fn now(outcome: &CommandOutcome) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self::new(outcome, timestamp)
    }
}

/// Liveness ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthPing {
    pub action: String,
}

impl Default for HealthPing {
    fn default() -> Self {
        Self {
            action: "health".to_string(),
        }
    }
}
