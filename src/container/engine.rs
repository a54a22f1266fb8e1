//! Narrow interfaces to the container build engine and its image store.

use std::collections::BTreeMap;

use anyhow::Result;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::capability::Capabilities;

/// Whether a command may reach the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NetworkPolicy {
    #[default]
    Disabled,
    Enabled,
}

/// When to pull the base image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PullPolicy {
    /// Only use an image already present in local storage.
    #[default]
    Never,
    /// Pull the image when it is missing locally.
    IfMissing,
}

/// Per-invocation options for running a command in a working container.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub network: NetworkPolicy,
    /// Added to the empty capability set the container runs with.
    pub capabilities: Capabilities,
    pub env: Vec<(String, String)>,
    /// Log each output line at DEBUG as it is captured.
    pub log_output: bool,
}

/// Outcome of a command run in a working container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Identifies a working container owned by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOptions {
    /// Base image reference, `repository[:tag][@digest]`.
    pub image: String,
    pub pull: PullPolicy,
}

/// Files to copy from the host into a working container.
///
/// The selected sources keep their paths relative to `context_dir`, so
/// `etc/app.conf` copied to `/opt/app` lands at `/opt/app/etc/app.conf`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddFiles {
    /// Absolute destination directory in the container.
    pub destination: String,
    /// Host directory that sources are resolved against and confined to.
    pub context_dir: Utf8PathBuf,
    /// Sources relative to `context_dir`.
    pub sources: Vec<String>,
    /// Ignore-file patterns applied within `context_dir`.
    pub excludes: Vec<String>,
    /// `user[:group]` owner for copied files.
    pub owner: Option<String>,
    pub mode: Option<u32>,
    /// Strip setuid and setgid bits from the copied files. Files already
    /// present under `destination` keep theirs.
    pub strip_special_bits: bool,
}

/// Inherited configuration to discard before new values are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClearConfig {
    #[serde(default)]
    pub annotations: bool,
    #[serde(default)]
    pub author: bool,
    #[serde(default)]
    pub cmd: bool,
    #[serde(default)]
    pub entrypoint: bool,
    #[serde(default)]
    pub env: bool,
    #[serde(default)]
    pub labels: bool,
    #[serde(default)]
    pub ports: bool,
}

/// Image configuration written before commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub clear: ClearConfig,
    pub os: String,
    pub annotations: BTreeMap<String, String>,
    pub author: Option<String>,
    pub cmd: Option<Vec<String>>,
    pub created_by: Option<String>,
    pub entrypoint: Option<Vec<String>>,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    /// Exposed ports as `number/protocol`.
    pub ports: Vec<String>,
    pub user: Option<String>,
    pub work_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOptions {
    /// Target `repository:tag`.
    pub reference: String,
    /// Additional reference pointing at the committed image.
    pub additional_tag: Option<String>,
    /// Keep individual layers and real timestamps instead of squashing.
    pub keep_history: bool,
}

/// The container build engine.
pub trait ContainerEngine: Send + Sync {
    /// Short engine name used in log messages.
    fn name(&self) -> &str;

    fn create(&self, options: &CreateOptions) -> Result<ContainerHandle>;

    /// The OS recorded in the container's image configuration.
    fn os(&self, container: &ContainerHandle) -> Result<String>;

    /// Runs `argv` to completion. A non-zero exit is reported in the output,
    /// not as an error.
    fn run(
        &self,
        container: &ContainerHandle,
        argv: &[String],
        options: &RunOptions,
    ) -> Result<RunOutput>;

    fn add_files(&self, container: &ContainerHandle, files: &AddFiles) -> Result<()>;

    fn configure(&self, container: &ContainerHandle, update: &ConfigUpdate) -> Result<()>;

    /// Commits the container and returns the new image ID.
    fn commit(&self, container: &ContainerHandle, options: &CommitOptions) -> Result<String>;

    fn delete(&self, container: &ContainerHandle) -> Result<()>;
}

/// The local image store.
pub trait ImageStore: Send + Sync {
    fn exists(&self, reference: &str) -> Result<bool>;

    /// Releases the store and returns any layers that were still mounted.
    fn shutdown(&self, force: bool) -> Result<Vec<String>>;
}
