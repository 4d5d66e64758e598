//! Session handlers for cmdrelay.
//!
//! Provides:
//! - `InteractiveHandler` - drives a program through a PTY
//! - `DirectHandler` - runs statements over a MySQL connection
//! - Boundary policies for delimiting interactive output
//! - `HandlerConfig` - maps a job's handler kind to a handler

pub mod boundary;
pub mod command;
pub mod config;
pub mod direct;
pub mod interactive;

pub use boundary::{BoundaryPolicy, DEFAULT_PROMPT, PromptMarker, Scan, Sentinel};
pub use command::{CommandBuildError, CommandBuilder, CommandParts};
pub use config::{
    BoundaryMode, DEFAULT_CONNECT_TIMEOUT, DirectConfig, HandlerConfig, InteractiveConfig,
    handler_for,
};
pub use direct::DirectHandler;
pub use interactive::InteractiveHandler;
