//! Pseudo-terminal channel to a single child process.

use std::{
    io::{ErrorKind, Read, Write},
    sync::{Arc, Mutex},
};

use portable_pty::{ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tokio::sync::mpsc;

use crate::{ExitSignal, resolve_executable_path};

/// Maximum bytes delivered per read.
pub const READ_CHUNK: usize = 1024;
const OUTPUT_QUEUE: usize = 256;

/// PTY error.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("Executable not found: {0}")]
    NotFound(String),
    #[error("Spawn failed: {0}")]
    Spawn(String),
    #[error("PTY is closed")]
    Closed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TermSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

impl From<TermSize> for PtySize {
    fn from(size: TermSize) -> Self {
        Self {
            rows: size.rows,
            cols: size.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

/// A child process attached to a pseudo-terminal.
///
/// Output is pumped by a blocking reader thread into a queue; an exit watcher
/// reaps the child, drops the master side and fires [`ExitSignal`]. Dropping
/// the channel kills the child if it is still running.
pub struct PtyChannel {
    output: mpsc::Receiver<Vec<u8>>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    master: Arc<Mutex<Option<Box<dyn MasterPty + Send>>>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    exited: ExitSignal,
    pid: Option<u32>,
}

impl PtyChannel {
    /// Spawn `program` on a new pseudo-terminal.
    ///
    /// # Errors
    /// Returns error if the program cannot be resolved or spawned.
    pub async fn open(program: &str, args: &[String], size: TermSize) -> Result<Self, PtyError> {
        let executable = resolve_executable_path(program)
            .await
            .ok_or_else(|| PtyError::NotFound(program.to_string()))?;

        let pair = native_pty_system()
            .openpty(size.into())
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&executable);
        cmd.args(args);
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        // Only the child may hold the slave, otherwise reads never see EOF.
        drop(pair.slave);

        let killer = child.clone_killer();
        let pid = child.process_id();
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        let master = Arc::new(Mutex::new(Some(pair.master)));

        let (output_tx, output) = mpsc::channel(OUTPUT_QUEUE);
        tokio::task::spawn_blocking(move || pump_output(reader, &output_tx));

        let exited = ExitSignal::new();
        tokio::task::spawn_blocking({
            let exited = exited.clone();
            let master = Arc::clone(&master);
            move || {
                let status = child.wait();
                if let Ok(mut guard) = master.lock() {
                    guard.take();
                }
                exited.fire();
                tracing::debug!(?pid, ?status, "PTY child exited");
            }
        });

        tracing::debug!(program = %executable.display(), ?args, ?pid, "Spawned PTY child");

        Ok(Self {
            output,
            writer: Arc::new(Mutex::new(writer)),
            master,
            killer: Mutex::new(killer),
            exited,
            pid,
        })
    }

    /// Next chunk of output, at most [`READ_CHUNK`] bytes. `None` means EOF.
    ///
    /// Chunks follow the child's write pattern; callers accumulate until
    /// they see whatever delimiter they need.
    pub async fn read(&mut self) -> Option<Vec<u8>> {
        self.output.recv().await
    }

    /// Write bytes to the child's input.
    ///
    /// # Errors
    /// Returns error if the write fails.
    pub async fn write(&self, data: &[u8]) -> Result<usize, PtyError> {
        let writer = Arc::clone(&self.writer);
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut guard = writer
                .lock()
                .map_err(|_| std::io::Error::other("PTY writer poisoned"))?;
            guard.write_all(&data)?;
            guard.flush()?;
            Ok::<_, std::io::Error>(data.len())
        })
        .await
        .map_err(|e| PtyError::Io(std::io::Error::other(e)))?
        .map_err(PtyError::from)
    }

    /// Propagate a new terminal size to the child.
    ///
    /// # Errors
    /// Returns error if the PTY is already released or the resize fails.
    pub fn resize(&self, size: TermSize) -> Result<(), PtyError> {
        let guard = self.master.lock().map_err(|_| PtyError::Closed)?;
        let master = guard.as_ref().ok_or(PtyError::Closed)?;
        master
            .resize(size.into())
            .map_err(|e| PtyError::Io(std::io::Error::other(e.to_string())))
    }

    /// Terminate the child. No-op once it has exited; safe to call repeatedly.
    ///
    /// On Unix the child gets `SIGKILL`; elsewhere the PTY backend's killer.
    pub fn close(&self) {
        if self.exited.is_fired() {
            return;
        }
        match self.force_kill() {
            Ok(()) => tracing::debug!(pid = ?self.pid, "Killed PTY child"),
            // Usually the child exited between the check and the kill.
            Err(e) => tracing::debug!(pid = ?self.pid, "Kill failed: {e}"),
        }
    }

    #[cfg(unix)]
    fn force_kill(&self) -> std::io::Result<()> {
        use nix::{
            sys::signal::{Signal, kill},
            unistd::Pid,
        };

        let Some(pid) = self.pid.and_then(|p| i32::try_from(p).ok()) else {
            return self.kill_with_backend();
        };
        kill(Pid::from_raw(pid), Signal::SIGKILL).map_err(std::io::Error::from)
    }

    #[cfg(not(unix))]
    fn force_kill(&self) -> std::io::Result<()> {
        self.kill_with_backend()
    }

    fn kill_with_backend(&self) -> std::io::Result<()> {
        self.killer
            .lock()
            .map_err(|_| std::io::Error::other("PTY killer poisoned"))?
            .kill()
    }

    /// Whether the child has exited and the PTY been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.exited.is_fired()
    }

    /// Wait for the child to exit.
    pub async fn wait_closed(&self) {
        self.exited.wait().await;
    }

    /// Exit signal shared with the watcher.
    #[must_use]
    pub fn exit_signal(&self) -> ExitSignal {
        self.exited.clone()
    }

    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }
}

impl Drop for PtyChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn pump_output(mut reader: Box<dyn Read + Send>, tx: &mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                // EIO once the child side closes.
                tracing::trace!("PTY reader finished: {e}");
                break;
            }
        }
    }
}
