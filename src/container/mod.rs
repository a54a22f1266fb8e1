//! The working container and the engine interfaces it is built on.
//!
//! [`WorkingContainer`] owns exactly one container for the duration of a
//! build. Every command runs synchronously; a non-zero exit becomes an
//! [`RsocistrapError::Execution`] carrying the captured stderr.

pub mod buildah;
mod engine;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, trace};

use crate::command::CommandDescriptor;
use crate::error::RsocistrapError;
use crate::executor::format_command_args;

pub use engine::{
    AddFiles, ClearConfig, CommitOptions, ConfigUpdate, ContainerEngine, ContainerHandle,
    CreateOptions, ImageStore, NetworkPolicy, PullPolicy, RunOptions, RunOutput,
};

/// Describes how a process exited, in the style of `std::process::ExitStatus`.
pub(crate) fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status: {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Execution context for a single working container.
pub struct WorkingContainer {
    engine: Arc<dyn ContainerEngine>,
    handle: ContainerHandle,
    env: Vec<(String, String)>,
    log_commands: bool,
}

impl WorkingContainer {
    /// Creates a working container from the base image in `options`.
    ///
    /// `env` is applied to every command run in the container.
    pub fn create(
        engine: Arc<dyn ContainerEngine>,
        options: &CreateOptions,
        env: Vec<(String, String)>,
        log_commands: bool,
    ) -> Result<Self> {
        let handle = engine
            .create(options)
            .with_context(|| format!("creating working container from {}", options.image))?;
        debug!("created working container {} ({})", handle.name, handle.id);
        Ok(Self {
            engine,
            handle,
            env,
            log_commands,
        })
    }

    pub fn id(&self) -> &str {
        &self.handle.id
    }

    pub fn name(&self) -> &str {
        &self.handle.name
    }

    pub fn os(&self) -> Result<String> {
        self.engine.os(&self.handle)
    }

    /// Runs `argv` and fails unless it exits successfully.
    pub fn run(&self, argv: &[String], options: &RunOptions) -> Result<RunOutput> {
        let mut options = options.clone();
        let mut env = self.env.clone();
        env.append(&mut options.env);
        options.env = env;
        options.log_output |= self.log_commands;

        trace!(
            network = ?options.network,
            capabilities = %options.capabilities,
            "running in {}: {}",
            self.handle.name,
            format_command_args(argv)
        );

        let output = self.engine.run(&self.handle, argv, &options)?;
        if !output.success() {
            return Err(RsocistrapError::Execution {
                command: argv.first().cloned().unwrap_or_default(),
                status: describe_exit(output.code),
                stderr: output.stderr,
            }
            .into());
        }
        Ok(output)
    }

    /// Runs a factory-built command with exactly its declared capabilities.
    pub fn run_command(
        &self,
        command: &CommandDescriptor,
        network: NetworkPolicy,
    ) -> Result<RunOutput> {
        self.run(
            &command.argv,
            &RunOptions {
                network,
                capabilities: command.capabilities.clone(),
                ..Default::default()
            },
        )
    }

    /// Looks up `name` in the container's `PATH`.
    pub fn find_executable(&self, name: &str) -> Result<Option<String>> {
        let argv = [
            "/bin/sh".to_string(),
            "-c".to_string(),
            "command -v \"$1\"".to_string(),
            "sh".to_string(),
            name.to_string(),
        ];
        let output = self.engine.run(&self.handle, &argv, &RunOptions {
            env: self.env.clone(),
            ..Default::default()
        })?;
        let path = output.stdout.trim();
        if output.success() && !path.is_empty() {
            Ok(Some(path.to_string()))
        } else {
            Ok(None)
        }
    }

    /// Resolves `name` to the path the container's shell would execute.
    pub fn resolve_executable(&self, name: &str) -> Result<String> {
        self.find_executable(name)?.ok_or_else(|| {
            RsocistrapError::ExecutableNotFound {
                executable: name.to_string(),
            }
            .into()
        })
    }

    pub fn add_files(&self, files: &AddFiles) -> Result<()> {
        self.engine.add_files(&self.handle, files)
    }

    pub fn configure(&self, update: &ConfigUpdate) -> Result<()> {
        self.engine.configure(&self.handle, update)
    }

    /// Commits the container and returns the image ID.
    pub fn commit(&self, options: &CommitOptions) -> Result<String> {
        self.engine.commit(&self.handle, options)
    }

    /// Deletes the container. Failures are returned for the caller to report.
    pub fn delete(self) -> Result<()> {
        self.engine.delete(&self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_exit() {
        assert_eq!(describe_exit(Some(100)), "exit status: 100");
        assert_eq!(describe_exit(None), "terminated by signal");
    }
}
