//! HTTP reporter for the orchestration server.

use std::time::Duration;

use async_trait::async_trait;
use cmdrelay_core::{
    BackendContext, CommandOutcome, Directive, ReportError, Reporter, TaskStatus,
};
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::protocol::{CallbackKind, CommandCallback, HealthPing, StatusUpdate, callback_path};

/// Reporter settings.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Attempts per health ping.
    pub health_retries: u32,
    pub health_retry_delay: Duration,
    /// Per-request timeout; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            health_retries: 3,
            health_retry_delay: Duration::from_secs(10),
            request_timeout: None,
        }
    }
}

/// Posts execution callbacks to `{host}/api/v1/behemoth/executions/{task_id}/`.
#[derive(Debug, Clone)]
pub struct HttpReporter {
    client: Client,
    base_url: String,
    token: String,
    org_id: String,
    config: ReporterConfig,
}

impl HttpReporter {
    /// Create a reporter for the given backend.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(backend: &BackendContext, config: ReporterConfig) -> Result<Self, ReportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(transport)?;
        Ok(Self {
            client,
            base_url: backend.base_url().to_string(),
            token: backend.token.clone(),
            org_id: backend.org_id.clone(),
            config,
        })
    }

    async fn post<T: Serialize + Sync>(
        &self,
        task_id: &str,
        kind: CallbackKind,
        body: &T,
    ) -> Result<(StatusCode, String), ReportError> {
        let url = format!("{}{}", self.base_url, callback_path(task_id, kind));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("X-JMS-ORG", &self.org_id)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;
        tracing::debug!(%url, status = status.as_u16(), "Callback delivered");
        Ok((status, text))
    }
}

#[async_trait]
impl Reporter for HttpReporter {
    async fn report_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        reason: Option<&str>,
    ) -> Result<(), ReportError> {
        let body = StatusUpdate::new(status, reason);
        let (code, text) = self.post(task_id, CallbackKind::Status, &body).await?;
        if code != StatusCode::OK {
            return Err(ReportError::Rejected {
                status: code.as_u16(),
                body: text,
            });
        }
        Ok(())
    }

    async fn report_command(
        &self,
        task_id: &str,
        outcome: &CommandOutcome,
    ) -> Result<Directive, ReportError> {
        let body = CommandCallback::now(outcome);
        let (code, text) = self.post(task_id, CallbackKind::Command, &body).await?;
        if code != StatusCode::OK {
            return Err(ReportError::Rejected {
                status: code.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|_| ReportError::InvalidResponse(text))
    }

    async fn report_health(&self, task_id: &str) {
        let attempts = self.config.health_retries.max(1);
        for attempt in 1..=attempts {
            match self
                .post(task_id, CallbackKind::Health, &HealthPing::default())
                .await
            {
                Ok(_) => return,
                Err(e) => {
                    tracing::warn!(task_id, attempt, error = %e, "Health ping failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.health_retry_delay).await;
                    }
                }
            }
        }
    }
}

#[allow(clippy::needless_pass_by_value)]
fn transport(err: reqwest::Error) -> ReportError {
    ReportError::Transport(err.to_string())
}
