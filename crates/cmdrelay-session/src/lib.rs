//! Task execution for cmdrelay.
//!
//! Provides:
//! - `TaskDriver` - runs a job's commands through a handler and reports them
//! - `run_encoded` - decode, validate and run in one call

pub mod driver;
#[cfg(test)]
mod testing;

pub use driver::{
    DEFAULT_COMMAND_DELAY, DriverConfig, StopInfo, TaskDriver, TaskError, TaskSummary,
    run_encoded,
};
