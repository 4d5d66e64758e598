//! Backend context carried by every job.

use serde::{Deserialize, Serialize};

/// Where and how to reach the orchestration server for one task.
///
/// Decoded from the job envelope; the reporter is built from it once
/// validation succeeds.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendContext {
    /// Base URL of the orchestration server, e.g. `https://ops.example.com`.
    #[serde(default)]
    pub host: String,

    /// Bearer token. Its first 32 bytes double as the command-file key.
    #[serde(default)]
    pub token: String,

    /// Organization header value.
    #[serde(default)]
    pub org_id: String,
}

impl BackendContext {
    /// Create a context from its parts.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        token: impl Into<String>,
        org_id: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            org_id: org_id.into(),
        }
    }

    /// Host with any trailing slash removed, ready for path joining.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.host.trim_end_matches('/')
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for BackendContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendContext")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .field("org_id", &self.org_id)
            .finish()
    }
}
