//! Backend reporting for cmdrelay.
//!
//! Provides:
//! - Wire protocol for execution callbacks (status, command, health)
//! - `HttpReporter` - `Reporter` over HTTP
//! - `spawn_heartbeat` - periodic health pings

pub mod heartbeat;
pub mod http;
pub mod protocol;

pub use heartbeat::spawn_heartbeat;
pub use http::{HttpReporter, ReporterConfig};
pub use protocol::{CallbackKind, CommandCallback, CommandStatus, HealthPing, StatusUpdate};
