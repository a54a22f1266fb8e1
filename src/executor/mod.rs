//! Host command execution for rsocistrap.
//!
//! This module provides:
//! - [`CommandSpec`]: Specification for commands to execute
//! - [`ExecutionResult`]: Exit status and captured output
//! - [`CommandExecutor`]: Trait for command execution strategies
//! - [`RealCommandExecutor`]: Production implementation using `std::process::Command`

mod pipe;
mod real;

use std::process::ExitStatus;

use anyhow::Result;

pub use pipe::sanitize_line;
pub use real::RealCommandExecutor;

/// Formats string arguments into a space-separated, debug-quoted string.
///
/// Used by error and trace messages to consistently format command
/// arguments (e.g., `"--quiet" "--name" "rsocistrap-1234"`).
pub(crate) fn format_command_args(args: &[String]) -> String {
    args.iter()
        .map(|a| format!("{:?}", a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Specification for a command to be executed
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The command to execute (e.g., "buildah")
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// When set, each output line is sanitized and logged at DEBUG
    /// as `"<label>: <stream>: <line>"`.
    pub log_label: Option<String>,
}

impl CommandSpec {
    /// Creates a new CommandSpec with command and args
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            log_label: None,
        }
    }

    /// Logs output lines under `label`.
    #[must_use]
    pub fn with_log_label(mut self, label: impl Into<String>) -> Self {
        self.log_label = Some(label.into());
        self
    }

    /// The command followed by its debug-quoted arguments.
    pub fn display(&self) -> String {
        format!("{} {}", self.command, format_command_args(&self.args))
    }
}

/// Result of command execution
#[derive(Debug)]
pub struct ExecutionResult {
    /// Exit status of the command
    pub status: ExitStatus,
    /// Everything the command wrote to standard output
    pub stdout: String,
    /// Everything the command wrote to standard error
    pub stderr: String,
}

impl ExecutionResult {
    /// Returns true if the command exited with status zero.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Returns the exit code, or `None` when terminated by a signal
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Trait for command execution.
///
/// A non-zero exit is reported through [`ExecutionResult`], not as an
/// error; errors mean the command could not be run or observed.
pub trait CommandExecutor: Send + Sync {
    /// Runs the command described by `spec`.
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_command_args() {
        let args = vec!["--quiet".to_string(), "a b".to_string()];
        assert_eq!(format_command_args(&args), "\"--quiet\" \"a b\"");
    }

    #[test]
    fn test_command_spec_builders() {
        let spec = CommandSpec::new("buildah", vec!["images".to_string()])
            .with_log_label("apk");
        assert_eq!(spec.log_label.as_deref(), Some("apk"));
        assert_eq!(spec.display(), "buildah \"images\"");
    }
}
