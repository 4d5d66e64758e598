//! Command-line flags.

use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum, builder::NonEmptyStringValueParser};
use cmdrelay_core::LoadOptions;
use cmdrelay_executor::{
    BoundaryMode, DEFAULT_PROMPT, DirectConfig, HandlerConfig, InteractiveConfig,
};
use cmdrelay_session::DriverConfig;
use cmdrelay_transport::ReporterConfig;

/// Default directory for per-task log files.
pub const DEFAULT_LOG_DIR: &str = "/tmp/behemoth/logs";

/// Replay a job's commands against a session and report each step to the
/// orchestration server.
#[derive(Debug, Parser)]
#[command(name = "cmdrelay", version, about, long_about = None)]
pub struct Args {
    /// Base64-encoded job envelope
    #[arg(long, env = "CMDRELAY_COMMAND", hide_env_values = true)]
    pub command: String,

    /// Re-launch detached in the background and exit immediately
    #[arg(long)]
    pub backend: bool,

    /// Directory for the `{task_id}-bs.log` file
    #[arg(long, env = "CMDRELAY_LOG_DIR", default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    /// Base directory for relative command file paths
    #[arg(long, env = "CMDRELAY_COMMAND_DIR")]
    pub command_dir: Option<PathBuf>,

    /// Prompt printed by the interactive program when it is ready
    #[arg(
        long,
        env = "CMDRELAY_PROMPT",
        default_value = DEFAULT_PROMPT,
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub prompt: String,

    /// How interactive command output is delimited
    #[arg(long, env = "CMDRELAY_BOUNDARY", value_enum, default_value_t = Boundary::Prompt)]
    pub boundary: Boundary,

    /// Pause between running a command and reporting it
    #[arg(long, env = "CMDRELAY_COMMAND_DELAY_MS", default_value_t = 2000)]
    pub command_delay_ms: u64,

    /// Bound on session startup
    #[arg(long, env = "CMDRELAY_CONNECT_TIMEOUT_SECS", default_value_t = 30)]
    pub connect_timeout_secs: u64,

    /// Send a health ping at this interval while the task runs
    #[arg(long, env = "CMDRELAY_HEALTH_INTERVAL_SECS")]
    pub health_interval_secs: Option<u64>,

    /// Timeout for each backend request
    #[arg(long, env = "CMDRELAY_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Do not send a final `failed` status when the backend stops the task
    #[arg(long)]
    pub no_stop_report: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Boundary {
    Prompt,
    Sentinel,
}

impl From<Boundary> for BoundaryMode {
    fn from(value: Boundary) -> Self {
        match value {
            Boundary::Prompt => Self::Prompt,
            Boundary::Sentinel => Self::Sentinel,
        }
    }
}

impl Args {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            command_dir: self.command_dir.clone(),
        }
    }

    pub fn handler_config(&self) -> HandlerConfig {
        let connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        HandlerConfig {
            interactive: InteractiveConfig {
                prompt: self.prompt.clone(),
                boundary: self.boundary.into(),
                connect_timeout,
                ..InteractiveConfig::default()
            },
            direct: DirectConfig { connect_timeout },
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            command_delay: Duration::from_millis(self.command_delay_ms),
            report_on_stop: !self.no_stop_report,
        }
    }

    pub fn reporter_config(&self) -> ReporterConfig {
        ReporterConfig {
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            ..ReporterConfig::default()
        }
    }

    pub fn health_interval(&self) -> Option<Duration> {
        self.health_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["cmdrelay", "--command", "e30="]).unwrap();
        assert!(!args.backend);
        assert_eq!(args.log_dir, PathBuf::from(DEFAULT_LOG_DIR));
        assert_eq!(args.driver_config().command_delay, Duration::from_secs(2));
        assert!(args.driver_config().report_on_stop);

        let handlers = args.handler_config();
        assert_eq!(handlers.interactive.prompt, "mysql> ");
        assert_eq!(handlers.interactive.boundary, BoundaryMode::Prompt);
        assert_eq!(handlers.interactive.connect_timeout, Duration::from_secs(30));
        assert_eq!(handlers.direct.connect_timeout, Duration::from_secs(30));
        assert_eq!(args.health_interval(), None);
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "cmdrelay",
            "--command",
            "e30=",
            "--boundary",
            "sentinel",
            "--prompt",
            "$ ",
            "--command-delay-ms",
            "0",
            "--health-interval-secs",
            "15",
            "--no-stop-report",
        ])
        .unwrap();
        assert_eq!(args.handler_config().interactive.boundary, BoundaryMode::Sentinel);
        assert_eq!(args.handler_config().interactive.prompt, "$ ");
        assert_eq!(args.driver_config().command_delay, Duration::ZERO);
        assert!(!args.driver_config().report_on_stop);
        assert_eq!(args.health_interval(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_empty_prompt_is_rejected() {
        let err = Args::try_parse_from(["cmdrelay", "--command", "e30=", "--prompt", ""])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn test_zero_health_interval_disables_pings() {
        let args =
            Args::try_parse_from(["cmdrelay", "--command", "e30=", "--health-interval-secs", "0"])
                .unwrap();
        assert_eq!(args.health_interval(), None);
    }
}
