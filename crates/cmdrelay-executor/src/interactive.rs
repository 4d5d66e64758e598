//! Interactive handler: drives a program through a pseudo-terminal.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use cmdrelay_core::{HandlerError, SessionHandler};
use cmdrelay_pty::{PtyChannel, TermSize};

use crate::{
    boundary::{BoundaryPolicy, Scan, find},
    command::CommandBuilder,
    config::InteractiveConfig,
};

/// Runs commands by typing them into an interactive program and reading its
/// output back until the boundary policy reports the end of the command.
pub struct InteractiveHandler {
    program: String,
    args: Vec<String>,
    policy: Arc<dyn BoundaryPolicy>,
    connect_timeout: Duration,
    term_size: TermSize,
    channel: Option<PtyChannel>,
}

impl InteractiveHandler {
    #[must_use]
    pub fn new(program: String, args: Vec<String>, config: &InteractiveConfig) -> Self {
        Self {
            program,
            args,
            policy: config.policy(),
            connect_timeout: config.connect_timeout,
            term_size: config.term_size,
            channel: None,
        }
    }

    /// Replace the boundary policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn BoundaryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// The live channel, if connected.
    #[must_use]
    pub const fn channel(&self) -> Option<&PtyChannel> {
        self.channel.as_ref()
    }
}

#[async_trait]
impl SessionHandler for InteractiveHandler {
    async fn connect(&mut self) -> Result<(), HandlerError> {
        if self.policy.ready_marker().is_empty() {
            return Err(HandlerError::ConnectFailed(
                "ready prompt must not be empty".to_string(),
            ));
        }
        let parts = CommandBuilder::new(self.program.as_str())
            .params(self.args.iter().cloned())
            .build()
            .map_err(|e| HandlerError::SpawnFailed(e.to_string()))?;

        let channel = PtyChannel::open(&parts.program, &parts.args, self.term_size)
            .await
            .map_err(|e| HandlerError::SpawnFailed(e.to_string()))?;
        let channel = self.channel.insert(channel);

        let marker = self.policy.ready_marker().as_bytes();
        let wait_for_prompt = async {
            while let Some(chunk) = channel.read().await {
                if find(&chunk, marker).is_some() {
                    return Ok(());
                }
            }
            Err(HandlerError::ConnectFailed(format!(
                "{} exited before its prompt appeared",
                parts.program
            )))
        };

        tokio::time::timeout(self.connect_timeout, wait_for_prompt)
            .await
            .map_err(|_| HandlerError::PromptTimeout(self.connect_timeout))??;

        tracing::info!(program = %parts.program, "Interactive session ready");
        Ok(())
    }

    async fn execute(&mut self, command: &str) -> Result<String, HandlerError> {
        let channel = self.channel.as_mut().ok_or(HandlerError::NotConnected)?;
        channel
            .write(self.policy.frame(command).as_bytes())
            .await
            .map_err(|e| HandlerError::ExecutionFailed(e.to_string()))?;

        let mut output = Vec::new();
        loop {
            let Some(chunk) = channel.read().await else {
                return Err(HandlerError::ExecutionFailed(
                    "session ended before the command completed".to_string(),
                ));
            };
            if absorb(self.policy.as_ref(), &mut output, &chunk) {
                break;
            }
        }
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close();
            tracing::debug!(pid = ?channel.pid(), "Interactive session closed");
        }
    }
}

/// Append `chunk` to `output` as the policy dictates. Returns `true` once the
/// command boundary has been reached.
fn absorb(policy: &dyn BoundaryPolicy, output: &mut Vec<u8>, chunk: &[u8]) -> bool {
    match policy.scan(chunk) {
        Scan::Pending => {
            output.extend_from_slice(chunk);
            false
        }
        Scan::Reached { keep } => {
            output.extend_from_slice(&chunk[..keep.min(chunk.len())]);
            true
        }
    }
}
