//! Core abstractions for cmdrelay.
//!
//! This crate provides the fundamental building blocks:
//! - `JobSpec` and the command model, decoded from a base64 envelope
//! - AES-CBC decryption of command files
//! - `SessionHandler` and `Reporter` traits
//! - `BackendContext` - orchestration server coordinates

pub mod context;
pub mod crypto;
pub mod job;
pub mod model;
pub mod traits;

pub use context::BackendContext;
pub use job::{JobError, LoadOptions};
pub use model::{
    Command, CommandCategory, CommandOutcome, HandlerKind, HostAuth, JobSpec, TaskPhase,
    TaskStatus,
};
pub use traits::{
    Directive, HandlerError, HandlerFactory, ReportError, Reporter, SessionHandler,
};
