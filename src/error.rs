//! Domain-specific error types for rsocistrap.
//!
//! This module defines `RsocistrapError`, a `thiserror`-based enum that
//! provides typed error variants for common failure modes. Public API
//! functions that can fail in a well-known way return
//! `Result<T, RsocistrapError>`, while trait boundaries (command executors,
//! container engines, image stores) and the orchestrators use
//! `anyhow::Result` so context can be layered on top.
//!
//! `RsocistrapError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically, and callers can still recover the typed
//! variant with `downcast_ref`.

use std::io;

/// Formats an IO error kind into a human-readable message.
///
/// Provides consistent messages for common IO error kinds
/// (e.g., "I/O error: not found") instead of the OS-level messages
/// (e.g., "No such file or directory (os error 2)").
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Renders captured stderr as a quoted suffix, or nothing when it is blank.
fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(" ({:?})", trimmed)
    }
}

/// Domain-specific error type for rsocistrap.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RsocistrapError {
    /// A validation constraint was violated.
    #[error("validation error: {0}")]
    Validation(String),

    /// A configuration file could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Tool output did not match the expected format.
    #[error("parse error: {0}")]
    Parse(String),

    /// A command factory was requested for an unset backend identifier.
    #[error("unsupported {axis} backend: {name}")]
    UnsupportedBackend {
        /// Backend axis (`package`, `user`, `find`).
        axis: &'static str,
        /// Display name of the rejected identifier.
        name: String,
    },

    /// A command ran but did not succeed, or could not be driven to completion.
    #[error("command execution failed: {command}: {status}{}", stderr_suffix(.stderr))]
    Execution {
        /// The command that was executed.
        command: String,
        /// Exit code, signal information, or a description of the internal failure.
        status: String,
        /// Captured standard error, if any.
        stderr: String,
    },

    /// A host command could not be found in `PATH`.
    #[error("command not found in PATH: {command}")]
    CommandNotFound {
        /// The command that was looked up.
        command: String,
    },

    /// An executable could not be resolved inside the working container.
    #[error("executable not found in container PATH: {executable}")]
    ExecutableNotFound {
        /// The executable that was looked up.
        executable: String,
    },

    /// The target image already exists and overwriting was not requested.
    #[error("image {reference} already exists")]
    ImageExists {
        /// The `repository:tag` reference that was found in the store.
        reference: String,
    },

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// A file path or an operation description with a path.
        context: String,
        /// Derived from [`io_error_kind_message`].
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl RsocistrapError {
    /// Creates an `Io` variant with the `message` field derived from `source`.
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }
}
