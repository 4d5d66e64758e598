//! Command-boundary detection for interactive sessions.
//!
//! An interactive program gives no structured signal that a command has
//! finished. A [`BoundaryPolicy`] decides what to write for each command and
//! where its output ends.

use std::fmt;

use uuid::Uuid;

/// Prompt printed by the MySQL client when it is ready for input.
pub const DEFAULT_PROMPT: &str = "mysql> ";

/// Result of scanning one output chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// No boundary in this chunk; keep all of it.
    Pending,
    /// Boundary found; keep the first `keep` bytes and stop.
    Reached { keep: usize },
}

/// Pluggable command-boundary detection.
pub trait BoundaryPolicy: Send + Sync + fmt::Debug {
    /// Marker that shows the program is ready after startup.
    fn ready_marker(&self) -> &str;

    /// Bytes written to the program to run `command`.
    fn frame(&self, command: &str) -> String;

    /// Look for the end of the current command's output in `chunk`.
    fn scan(&self, chunk: &[u8]) -> Scan;
}

/// Prompt substring matching.
///
/// A chunk containing the prompt ends the command and is dropped whole. If
/// the command output itself contains the prompt text, capture stops early;
/// the protocol cannot tell the two apart.
#[derive(Debug, Clone)]
pub struct PromptMarker {
    marker: String,
}

impl PromptMarker {
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Default for PromptMarker {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT)
    }
}

impl BoundaryPolicy for PromptMarker {
    fn ready_marker(&self) -> &str {
        &self.marker
    }

    fn frame(&self, command: &str) -> String {
        format!("{command}\n")
    }

    fn scan(&self, chunk: &[u8]) -> Scan {
        if find(chunk, self.marker.as_bytes()).is_some() {
            Scan::Reached { keep: 0 }
        } else {
            Scan::Pending
        }
    }
}

/// Unique sentinel printed after every command.
///
/// For shell-like programs that support `printf`. The sentinel is written as
/// two quoted halves so the terminal echo of the typed line never matches;
/// only the program's own output joins them. Output up to the sentinel is
/// kept. Like the prompt, the sentinel must arrive within a single chunk.
#[derive(Debug, Clone)]
pub struct Sentinel {
    prompt: String,
    head: String,
    tail: String,
}

impl Sentinel {
    /// Sentinel policy whose startup wait still uses `prompt`.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            head: "__CMDRELAY_".to_string(),
            tail: format!("{}__", Uuid::new_v4().simple()),
        }
    }

    /// The joined sentinel as printed by the program.
    #[must_use]
    pub fn marker(&self) -> String {
        format!("{}{}", self.head, self.tail)
    }
}

impl BoundaryPolicy for Sentinel {
    fn ready_marker(&self) -> &str {
        &self.prompt
    }

    fn frame(&self, command: &str) -> String {
        format!(
            "{command}\nprintf '%s%s\\n' '{}' '{}'\n",
            self.head, self.tail
        )
    }

    fn scan(&self, chunk: &[u8]) -> Scan {
        match find(chunk, self.marker().as_bytes()) {
            Some(keep) => Scan::Reached { keep },
            None => Scan::Pending,
        }
    }
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
