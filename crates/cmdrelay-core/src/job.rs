//! Job envelope decoding.
//!
//! The envelope is base64-encoded JSON. Commands come either inline or from a
//! separate command file, which may be AES-encrypted (see [`crate::crypto`]).

use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    BackendContext,
    crypto::{self, DecryptError},
    model::{Command, HandlerKind, HostAuth, JobSpec},
};

/// Job validation error. Each variant is a distinct input failure.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid base64 job envelope: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid job envelope JSON: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("Job envelope has no task id")]
    MissingTaskId,
    #[error("Cannot read command file {path}: {source}")]
    CommandFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid command set JSON: {0}")]
    CommandSet(#[source] serde_json::Error),
    #[error("Command file decryption failed: {0}")]
    Decrypt(#[from] DecryptError),
    #[error("Unsupported command type: {0}")]
    UnsupportedKind(String),
}

/// Options controlling how jobs are loaded.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Base directory for relative command file paths.
    pub command_dir: Option<PathBuf>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    task_id: String,
    #[serde(flatten)]
    backend: BackendContext,
    #[serde(default)]
    script: String,
    #[serde(default)]
    script_args: Vec<String>,
    #[serde(default)]
    auth: HostAuth,
    #[serde(default)]
    cmd_type: String,
    #[serde(default, alias = "remote_commands_file")]
    cmd_filepath: String,
    #[serde(default)]
    command_set: Vec<Command>,
    #[serde(default, rename = "encrypted_data")]
    encrypted: bool,
}

#[derive(Deserialize)]
struct CommandFile {
    #[serde(default)]
    command_set: Vec<Command>,
}

impl JobSpec {
    /// Decode a base64 job envelope into a validated job.
    ///
    /// # Errors
    /// Returns the first validation failure encountered.
    pub fn decode(encoded: &str, opts: &LoadOptions) -> Result<Self, JobError> {
        let raw = BASE64.decode(encoded.trim())?;
        let envelope: Envelope = serde_json::from_slice(&raw).map_err(JobError::Envelope)?;
        if envelope.task_id.is_empty() {
            return Err(JobError::MissingTaskId);
        }

        let commands = if envelope.cmd_filepath.is_empty() {
            envelope.command_set
        } else {
            let path = resolve_path(&envelope.cmd_filepath, opts);
            load_command_file(&path, envelope.encrypted, &envelope.backend.token)?
        };

        let kind = HandlerKind::from_tag(&envelope.cmd_type)
            .ok_or_else(|| JobError::UnsupportedKind(envelope.cmd_type.clone()))?;

        tracing::debug!(
            task_id = %envelope.task_id,
            ?kind,
            commands = commands.len(),
            "Decoded job envelope"
        );

        Ok(Self {
            task_id: envelope.task_id,
            backend: envelope.backend,
            auth: envelope.auth,
            kind,
            program: envelope.script,
            program_args: envelope.script_args,
            commands,
        })
    }
}

fn resolve_path(raw: &str, opts: &LoadOptions) -> PathBuf {
    let path = Path::new(raw);
    match &opts.command_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

fn load_command_file(path: &Path, encrypted: bool, token: &str) -> Result<Vec<Command>, JobError> {
    let mut text = std::fs::read(path).map_err(|source| JobError::CommandFile {
        path: path.to_path_buf(),
        source,
    })?;
    if encrypted {
        text = crypto::decrypt_command_file(token, &text)?;
    }
    let file: CommandFile = serde_json::from_slice(&text).map_err(JobError::CommandSet)?;
    Ok(file.command_set)
}
