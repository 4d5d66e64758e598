//! Interactive program command-line building.

use thiserror::Error;

/// Command build error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandBuildError {
    #[error("Program cannot be parsed: {0}")]
    InvalidBase(String),
    #[error("Program is empty after parsing")]
    EmptyCommand,
}

/// Parsed command parts (program + args).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParts {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandParts {
    /// Create new command parts.
    #[must_use]
    pub const fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

/// Builder for the program an interactive session runs.
///
/// The job carries a program string and an argument list. With explicit
/// arguments the program string is the executable path, taken verbatim.
/// Without them a program string such as `"mysql -h db -uroot"` is split
/// shell-style.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    /// Base program, possibly with inline arguments.
    pub base: String,
    /// Explicit arguments appended after the base.
    pub params: Vec<String>,
}

impl CommandBuilder {
    /// Create a new command builder.
    #[must_use]
    pub fn new<S: Into<String>>(base: S) -> Self {
        Self {
            base: base.into(),
            params: Vec::new(),
        }
    }

    /// Append explicit arguments.
    #[must_use]
    pub fn params<I>(mut self, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.params.extend(params.into_iter().map(Into::into));
        self
    }

    /// Build the program and its arguments.
    ///
    /// # Errors
    /// Returns error if the base cannot be parsed or is empty.
    pub fn build(&self) -> Result<CommandParts, CommandBuildError> {
        if !self.params.is_empty() {
            if self.base.trim().is_empty() {
                return Err(CommandBuildError::EmptyCommand);
            }
            return Ok(CommandParts::new(self.base.clone(), self.params.clone()));
        }

        let mut parts = split_command_line(&self.base)?;
        if parts.is_empty() {
            return Err(CommandBuildError::EmptyCommand);
        }
        let program = parts.remove(0);
        Ok(CommandParts::new(program, parts))
    }
}

fn split_command_line(input: &str) -> Result<Vec<String>, CommandBuildError> {
    shlex::split(input).ok_or_else(|| CommandBuildError::InvalidBase(input.to_string()))
}
