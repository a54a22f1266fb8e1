//! Command descriptors and the argument builder used by the command factories.

use crate::capability::Capabilities;

/// An argument vector plus the capabilities it must run with.
///
/// `argv[0]` is the executable name, resolved through the container's `PATH`
/// at execution time. An empty `argv` marks an operation that the backend
/// performs implicitly; orchestrators skip it without running anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub argv: Vec<String>,
    pub capabilities: Capabilities,
}

impl CommandDescriptor {
    pub fn new(argv: Vec<String>, capabilities: impl Into<Capabilities>) -> Self {
        Self {
            argv,
            capabilities: capabilities.into(),
        }
    }

    /// A documented no-op for the backend.
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn is_noop(&self) -> bool {
        self.argv.is_empty()
    }

    /// The executable name, or `""` for a no-op.
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }
}

/// Converts a fixed argument list into an owned argument vector.
pub(crate) fn to_argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Defines how a flag and its value are rendered in command arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagValueStyle {
    /// Render flag and value as separate arguments: `--flag value`.
    Separate,
    /// Render flag and value as a single argument with equals: `--flag=value`.
    Equals,
}

/// Builder for assembling argument vectors consistently across backends.
#[derive(Debug, Default)]
pub struct CommandArgsBuilder {
    args: Vec<String>,
}

impl CommandArgsBuilder {
    /// Starts a new argument vector with the program name.
    pub fn new(program: &str) -> Self {
        Self {
            args: vec![program.to_string()],
        }
    }

    /// Append a raw argument.
    pub fn push_arg(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    /// Append every item of `args` as a raw argument.
    pub fn push_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
    }

    /// Append a flag with no value.
    pub fn push_flag(&mut self, flag: &str) {
        self.args.push(flag.to_string());
    }

    /// Append a flag only when `enabled` is set.
    pub fn push_flag_if(&mut self, flag: &str, enabled: bool) {
        if enabled {
            self.push_flag(flag);
        }
    }

    /// Append a flag with value if the value is not empty.
    pub fn push_flag_value(&mut self, flag: &str, value: &str, style: FlagValueStyle) {
        if value.is_empty() {
            return;
        }

        match style {
            FlagValueStyle::Separate => {
                self.args.push(flag.to_string());
                self.args.push(value.to_string());
            }
            FlagValueStyle::Equals => {
                self.args.push(format!("{}={}", flag, value));
            }
        }
    }

    /// Append a flag for each non-empty value in `values`.
    pub fn push_flag_values(&mut self, flag: &str, values: &[String], style: FlagValueStyle) {
        for value in values {
            self.push_flag_value(flag, value, style);
        }
    }

    /// Return the collected arguments.
    pub fn into_args(self) -> Vec<String> {
        self.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;

    #[test]
    fn test_noop_descriptor() {
        let desc = CommandDescriptor::noop();
        assert!(desc.is_noop());
        assert!(desc.capabilities.is_empty());
        assert_eq!(desc.program(), "");
    }

    #[test]
    fn test_descriptor_program() {
        let desc = CommandDescriptor::new(
            vec!["apt".to_string(), "clean".to_string()],
            [Capability::Chown],
        );
        assert!(!desc.is_noop());
        assert_eq!(desc.program(), "apt");
    }

    #[test]
    fn test_builder_styles() {
        let mut builder = CommandArgsBuilder::new("useradd");
        builder.push_flag_value("--uid", "1000", FlagValueStyle::Separate);
        builder.push_flag_value("--comment", "", FlagValueStyle::Separate);
        builder.push_flag_value("--pull", "never", FlagValueStyle::Equals);
        builder.push_flag_if("--create-home", true);
        builder.push_flag_if("--user-group", false);
        builder.push_arg("dev");
        assert_eq!(
            builder.into_args(),
            vec!["useradd", "--uid", "1000", "--pull=never", "--create-home", "dev"]
        );
    }

    #[test]
    fn test_builder_flag_values() {
        let mut builder = CommandArgsBuilder::new("buildah");
        builder.push_flag_values(
            "--cap-add",
            &["CAP_CHOWN".to_string(), String::new(), "CAP_FOWNER".to_string()],
            FlagValueStyle::Equals,
        );
        assert_eq!(
            builder.into_args(),
            vec!["buildah", "--cap-add=CAP_CHOWN", "--cap-add=CAP_FOWNER"]
        );
    }
}
