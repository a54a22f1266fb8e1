//! Internal utilities for capturing command output.
//!
//! This module reads stdout/stderr pipes to completion, optionally logging
//! each sanitized line as it arrives.

use std::io::{BufRead, BufReader, Read};
use std::sync::LazyLock;

use regex::Regex;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b(\[[0-9;?]*[ -/]*[@-~]|\][^\x07]*\x07|[@-Z\\-_])").expect("valid regex")
});

/// Type of output stream for logging purposes.
#[derive(Clone, Copy)]
pub(super) enum StreamType {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Extracts a human-readable message from a thread panic.
pub(super) fn panic_message(err: &(dyn std::any::Any + Send)) -> &str {
    err.downcast_ref::<&str>()
        .copied()
        .or_else(|| err.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}

/// Makes a line of tool output safe and compact for logging.
///
/// ANSI escape sequences and non-graphic characters are removed and runs of
/// whitespace collapse to a single space.
pub fn sanitize_line(line: &str) -> String {
    let stripped = ANSI_ESCAPE.replace_all(line, "");
    stripped
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads a pipe to EOF and returns its contents.
///
/// - Binary data uses lossy UTF-8 conversion
/// - When `label` is set, each non-blank sanitized line is logged at DEBUG
/// - I/O errors stop reading but don't fail command execution
///   (success is determined by exit status)
/// - `None` pipe logs an error and returns an empty string
pub(super) fn read_pipe<R: Read>(
    pipe: Option<R>,
    stream_type: StreamType,
    label: Option<&str>,
) -> String {
    let Some(pipe) = pipe else {
        tracing::error!(
            stream = %stream_type,
            "pipe was None (unexpected: Stdio::piped() was set), no output will be captured"
        );
        return String::new();
    };

    let mut reader = BufReader::new(pipe);
    let mut captured = String::new();
    let mut line_buf = Vec::new();

    loop {
        line_buf.clear();
        match reader.read_until(b'\n', &mut line_buf) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let text = String::from_utf8_lossy(&line_buf);
                if let Some(label) = label {
                    log_line(label, &text, stream_type);
                }
                captured.push_str(&text);
            }
            Err(e) => {
                tracing::error!(stream = %stream_type, error = %e, "I/O error, stopping read");
                break;
            }
        }
    }

    captured
}

fn log_line(label: &str, line: &str, stream_type: StreamType) {
    let sanitized = sanitize_line(line);
    if !sanitized.is_empty() {
        tracing::debug!("{}: {}: {}", label, stream_type, sanitized);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_ansi_and_collapses_whitespace() {
        assert_eq!(sanitize_line("\x1b[1;32mOK\x1b[0m   done\r\n"), "OK done");
        assert_eq!(sanitize_line("a\tb\x07c"), "a bc");
        assert_eq!(sanitize_line("   \r"), "");
    }

    #[test]
    fn test_read_pipe_captures_everything() {
        let data: &[u8] = b"first\r\nsecond\nthird";
        let captured = read_pipe(Some(data), StreamType::Stdout, Some("apk"));
        assert_eq!(captured, "first\r\nsecond\nthird");
    }

    #[test]
    fn test_read_pipe_none() {
        assert_eq!(read_pipe(None::<&[u8]>, StreamType::Stderr, None), "");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(42);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
