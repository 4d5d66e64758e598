//! Pseudo-terminal session channel.
//!
//! Provides:
//! - `PtyChannel` - spawn, read, write, resize and kill a PTY-attached child
//! - `ExitSignal` - one-shot exit notification
//! - Executable resolution

pub mod channel;
pub mod resolve;
pub mod signal;

pub use channel::{PtyChannel, PtyError, TermSize};
pub use resolve::resolve_executable_path;
pub use signal::ExitSignal;
