//! `cmdrelay`: run one job and report it to the orchestration server.

mod args;
mod detach;
mod logging;

use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use cmdrelay_core::JobSpec;
use cmdrelay_session::{TaskDriver, TaskError, TaskSummary};
use cmdrelay_transport::{HttpReporter, spawn_heartbeat};

use crate::args::Args;

const EXIT_VALIDATION: u8 = 2;
const EXIT_TRANSPORT: u8 = 3;
const EXIT_CONNECT: u8 = 4;
const EXIT_STOPPED: u8 = 5;
const EXIT_OTHER: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.backend {
        return match detach::spawn_detached() {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e:#}");
                ExitCode::from(EXIT_OTHER)
            }
        };
    }

    let job = match JobSpec::decode(&args.command, &args.load_options()) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("Invalid job: {e}");
            return ExitCode::from(EXIT_VALIDATION);
        }
    };

    let _log_guard = match logging::init_task_log(&args.log_dir, &job.task_id) {
        Ok((guard, path)) => {
            tracing::debug!(path = %path.display(), "Logging to file");
            guard
        }
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::from(EXIT_OTHER);
        }
    };

    match run(&args, job).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Task setup failed: {e:#}");
            ExitCode::from(EXIT_OTHER)
        }
    }
}

async fn run(args: &Args, job: JobSpec) -> anyhow::Result<ExitCode> {
    let reporter = Arc::new(HttpReporter::new(&job.backend, args.reporter_config())?);
    let heartbeat = args
        .health_interval()
        .map(|every| spawn_heartbeat(Arc::clone(&reporter), job.task_id.clone(), every));

    let handlers = args.handler_config();
    let driver = TaskDriver::new(job, reporter, args.driver_config());

    let result = tokio::select! {
        result = driver.run(&handlers) => Some(result),
        () = shutdown_signal() => None,
    };

    if let Some(heartbeat) = heartbeat {
        heartbeat.abort();
    }

    let Some(result) = result else {
        tracing::warn!("Interrupted; session released");
        return Ok(ExitCode::from(EXIT_OTHER));
    };
    Ok(ExitCode::from(exit_code(&result)))
}

fn exit_code(result: &Result<TaskSummary, TaskError>) -> u8 {
    match result {
        Ok(summary) if summary.stopped.is_some() => EXIT_STOPPED,
        Ok(_) => 0,
        Err(TaskError::Validation(_)) => EXIT_VALIDATION,
        Err(TaskError::Transport(_)) => EXIT_TRANSPORT,
        Err(TaskError::Connect(_)) => EXIT_CONNECT,
        Err(TaskError::Handler(_)) => EXIT_OTHER,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
