//! Container engine and image store backed by the `buildah` CLI.
//!
//! Every operation becomes one or more `buildah` invocations issued through
//! a [`CommandExecutor`], so the adapter can be exercised without buildah
//! installed by substituting a recording executor.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::describe_exit;
use super::engine::{
    AddFiles, CommitOptions, ConfigUpdate, ContainerEngine, ContainerHandle, CreateOptions,
    ImageStore, NetworkPolicy, PullPolicy, RunOptions, RunOutput,
};
use crate::capability::{Capabilities, Capability};
use crate::command::{CommandArgsBuilder, FlagValueStyle};
use crate::error::RsocistrapError;
use crate::executor::{CommandExecutor, CommandSpec, ExecutionResult};

const BUILDAH: &str = "buildah";

/// Prefix of working container names.
const CONTAINER_NAME_PREFIX: &str = "rsocistrap";

/// Annotations inherited from the base image that describe it and are kept
/// when inherited annotations are cleared.
const BASE_IMAGE_ANNOTATION_PREFIX: &str = "org.opencontainers.image.base.";

/// Container storage locations. Unset values use buildah's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageOptions {
    /// Storage root directory (`--root`)
    #[serde(default)]
    pub root: Option<Utf8PathBuf>,
    /// Runtime state directory (`--runroot`)
    #[serde(default)]
    pub run_root: Option<Utf8PathBuf>,
    /// Storage driver such as `overlay` or `vfs` (`--storage-driver`)
    #[serde(default)]
    pub driver: Option<String>,
}

impl StorageOptions {
    fn global_args(&self) -> Vec<String> {
        let mut args = CommandArgsBuilder::default();
        if let Some(root) = &self.root {
            args.push_flag_value("--root", root.as_str(), FlagValueStyle::Equals);
        }
        if let Some(run_root) = &self.run_root {
            args.push_flag_value("--runroot", run_root.as_str(), FlagValueStyle::Equals);
        }
        if let Some(driver) = &self.driver {
            args.push_flag_value("--storage-driver", driver, FlagValueStyle::Equals);
        }
        args.into_args()
    }
}

/// Shared invocation plumbing for the engine and the store.
#[derive(Clone)]
struct Buildah {
    executor: Arc<dyn CommandExecutor>,
    storage: StorageOptions,
}

impl Buildah {
    fn spec(&self, args: Vec<String>) -> CommandSpec {
        let mut full = self.storage.global_args();
        full.extend(args);
        CommandSpec::new(BUILDAH, full)
    }

    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        trace!("executing: {}", spec.display());
        self.executor.execute(spec)
    }

    /// Runs buildah and returns its stdout, failing on a non-zero exit.
    fn output(&self, args: Vec<String>) -> Result<String> {
        let spec = self.spec(args);
        let result = self.execute(&spec)?;
        if !result.success() {
            return Err(RsocistrapError::Execution {
                command: spec.display(),
                status: result.status.to_string(),
                stderr: result.stderr,
            }
            .into());
        }
        Ok(result.stdout)
    }

    fn inspect_container(&self, container: &ContainerHandle, template: &str) -> Result<String> {
        self.output(vec![
            "inspect".to_string(),
            "--type".to_string(),
            "container".to_string(),
            "--format".to_string(),
            template.to_string(),
            container.name.clone(),
        ])
    }

    /// Decodes `field` of the container's build state, rendered as JSON.
    /// A field that is not set (`null`) decodes to the default value.
    fn inspect_json<T>(&self, container: &ContainerHandle, field: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let text = self.inspect_container(container, &format!("{{{{json {}}}}}", field))?;
        let value: Option<T> = serde_json::from_str(text.trim())
            .with_context(|| format!("decoding {} of container {}", field, container.name))?;
        Ok(value.unwrap_or_default())
    }
}

/// [`ContainerEngine`] driving `buildah`.
pub struct BuildahEngine {
    buildah: Buildah,
}

impl BuildahEngine {
    pub fn new(executor: Arc<dyn CommandExecutor>, storage: StorageOptions) -> Self {
        Self {
            buildah: Buildah { executor, storage },
        }
    }

    fn config_args(
        &self,
        container: &ContainerHandle,
        update: &ConfigUpdate,
    ) -> Result<Vec<String>> {
        let mut args = CommandArgsBuilder::new("config");

        let clear = update.clear;
        if clear.annotations {
            let annotations: BTreeMap<String, String> =
                self.buildah.inspect_json(container, ".ImageAnnotations")?;
            for key in annotations.keys() {
                if !key.starts_with(BASE_IMAGE_ANNOTATION_PREFIX) {
                    let removal = format!("{}-", key);
                    args.push_flag_value("--annotation", &removal, FlagValueStyle::Separate);
                }
            }
        }
        if clear.author {
            args.push_arg("--author=");
        }
        if clear.cmd {
            args.push_arg("--cmd=");
        }
        if clear.entrypoint {
            args.push_arg("--entrypoint=");
        }
        if clear.env {
            let env: Vec<String> = self.buildah.inspect_json(container, ".OCIv1.Config.Env")?;
            for entry in env {
                let key = entry.split_once('=').map_or(entry.as_str(), |(k, _)| k);
                args.push_flag_value("--env", &format!("{}-", key), FlagValueStyle::Separate);
            }
        }
        if clear.labels {
            let labels: BTreeMap<String, String> =
                self.buildah.inspect_json(container, ".OCIv1.Config.Labels")?;
            for key in labels.keys() {
                args.push_flag_value("--label", &format!("{}-", key), FlagValueStyle::Separate);
            }
        }
        if clear.ports {
            let ports: BTreeMap<String, serde_json::Value> =
                self.buildah.inspect_json(container, ".OCIv1.Config.ExposedPorts")?;
            for port in ports.keys() {
                args.push_flag_value("--port", &format!("{}-", port), FlagValueStyle::Separate);
            }
        }

        args.push_flag_value("--os", &update.os, FlagValueStyle::Separate);
        for (key, value) in &update.annotations {
            let annotation = format!("{}={}", key, value);
            args.push_flag_value("--annotation", &annotation, FlagValueStyle::Separate);
        }
        if let Some(author) = &update.author {
            args.push_flag_value("--author", author, FlagValueStyle::Separate);
        }
        if let Some(cmd) = &update.cmd {
            let cmd = serde_json::to_string(cmd).context("encoding command")?;
            args.push_flag_value("--cmd", &cmd, FlagValueStyle::Separate);
        }
        if let Some(created_by) = &update.created_by {
            args.push_flag_value("--created-by", created_by, FlagValueStyle::Separate);
        }
        if let Some(entrypoint) = &update.entrypoint {
            let entrypoint = serde_json::to_string(entrypoint).context("encoding entrypoint")?;
            args.push_flag_value("--entrypoint", &entrypoint, FlagValueStyle::Separate);
        }
        for (key, value) in &update.env {
            args.push_flag_value("--env", &format!("{}={}", key, value), FlagValueStyle::Separate);
        }
        for (key, value) in &update.labels {
            let label = format!("{}={}", key, value);
            args.push_flag_value("--label", &label, FlagValueStyle::Separate);
        }
        args.push_flag_values("--port", &update.ports, FlagValueStyle::Separate);
        if let Some(user) = &update.user {
            args.push_flag_value("--user", user, FlagValueStyle::Separate);
        }
        if let Some(work_dir) = &update.work_dir {
            args.push_flag_value("--workingdir", work_dir, FlagValueStyle::Separate);
        }

        args.push_arg(container.name.as_str());
        Ok(args.into_args())
    }

    /// Removes the bits from the copied entries only. Sources that are
    /// directories on the host are changed recursively.
    fn strip_special_bits(&self, container: &ContainerHandle, files: &AddFiles) -> Result<()> {
        let (directories, others): (Vec<&String>, Vec<&String>) = files
            .sources
            .iter()
            .partition(|source| files.context_dir.join(source.as_str()).is_dir());

        for (recursive, sources) in [(false, others), (true, directories)] {
            if sources.is_empty() {
                continue;
            }
            let mut argv = vec!["chmod".to_string()];
            if recursive {
                argv.push("-R".to_string());
            }
            argv.push("ug-s".to_string());
            argv.extend(sources.iter().map(|source| copied_path(&files.destination, source)));

            let output = self.run(container, &argv, &RunOptions {
                capabilities: Capabilities::from([Capability::DacReadSearch, Capability::Fowner]),
                ..Default::default()
            })?;
            if !output.success() {
                return Err(RsocistrapError::Execution {
                    command: argv.join(" "),
                    status: describe_exit(output.code),
                    stderr: output.stderr,
                }
                .into());
            }
        }
        Ok(())
    }
}

impl ContainerEngine for BuildahEngine {
    fn name(&self) -> &str {
        BUILDAH
    }

    fn create(&self, options: &CreateOptions) -> Result<ContainerHandle> {
        let name = format!("{}-{}", CONTAINER_NAME_PREFIX, uuid::Uuid::new_v4());
        let pull = match options.pull {
            PullPolicy::Never => "never",
            PullPolicy::IfMissing => "missing",
        };

        let mut args = CommandArgsBuilder::new("from");
        args.push_flag("--quiet");
        args.push_flag_value("--name", &name, FlagValueStyle::Separate);
        args.push_flag_value("--pull", pull, FlagValueStyle::Equals);
        args.push_flag_value("--isolation", "rootless", FlagValueStyle::Equals);
        args.push_flag_value("--cap-drop", "all", FlagValueStyle::Equals);
        args.push_arg(options.image.as_str());
        self.buildah.output(args.into_args())?;

        let handle = ContainerHandle {
            id: String::new(),
            name,
        };
        let id = self
            .buildah
            .inspect_container(&handle, "{{.ContainerID}}")?
            .trim()
            .to_string();
        Ok(ContainerHandle { id, ..handle })
    }

    fn os(&self, container: &ContainerHandle) -> Result<String> {
        Ok(self
            .buildah
            .inspect_container(container, "{{.OCIv1.OS}}")?
            .trim()
            .to_string())
    }

    fn run(
        &self,
        container: &ContainerHandle,
        argv: &[String],
        options: &RunOptions,
    ) -> Result<RunOutput> {
        let mut args = CommandArgsBuilder::new("run");
        if options.network == NetworkPolicy::Disabled {
            args.push_flag_value("--network", "none", FlagValueStyle::Equals);
        }
        args.push_flag_values("--cap-add", &options.capabilities.names(), FlagValueStyle::Equals);
        for (key, value) in &options.env {
            args.push_flag_value("--env", &format!("{}={}", key, value), FlagValueStyle::Separate);
        }
        args.push_arg(container.name.as_str());
        args.push_arg("--");
        args.push_args(argv.iter().cloned());

        let mut spec = self.buildah.spec(args.into_args());
        if options.log_output {
            let label = argv.first().map(String::as_str).unwrap_or(BUILDAH);
            spec = spec.with_log_label(label);
        }
        let result = self.buildah.execute(&spec)?;
        Ok(RunOutput {
            code: result.code(),
            stdout: result.stdout,
            stderr: result.stderr,
        })
    }

    fn add_files(&self, container: &ContainerHandle, files: &AddFiles) -> Result<()> {
        let mut args = CommandArgsBuilder::new("add");
        if let Some(owner) = &files.owner {
            args.push_flag_value("--chown", owner, FlagValueStyle::Equals);
        }
        if let Some(mode) = files.mode {
            args.push_flag_value("--chmod", &format!("{:o}", mode), FlagValueStyle::Equals);
        }
        args.push_flag_value("--contextdir", files.context_dir.as_str(), FlagValueStyle::Equals);

        let ignore_file = write_ignore_file(&ignore_patterns(&files.sources, &files.excludes))?;
        let _ignore_guard = TempFileGuard::new(ignore_file.clone());
        args.push_flag_value("--ignorefile", ignore_file.as_str(), FlagValueStyle::Equals);

        args.push_arg(container.name.as_str());
        args.push_arg(files.context_dir.as_str());
        args.push_arg(files.destination.as_str());
        self.buildah.output(args.into_args())?;

        if files.strip_special_bits {
            self.strip_special_bits(container, files).with_context(|| {
                format!("removing SUID and SGID bits from files copied to {}", files.destination)
            })?;
        }
        Ok(())
    }

    fn configure(&self, container: &ContainerHandle, update: &ConfigUpdate) -> Result<()> {
        let args = self.config_args(container, update)?;
        self.buildah.output(args)?;
        Ok(())
    }

    fn commit(&self, container: &ContainerHandle, options: &CommitOptions) -> Result<String> {
        let mut args = CommandArgsBuilder::new("commit");
        args.push_flag("--quiet");
        args.push_flag_value("--format", "oci", FlagValueStyle::Separate);
        if !options.keep_history {
            args.push_flag("--squash");
            args.push_flag_value("--timestamp", "0", FlagValueStyle::Separate);
        }
        args.push_arg(container.name.as_str());
        args.push_arg(options.reference.as_str());
        let id = self.buildah.output(args.into_args())?.trim().to_string();

        if let Some(tag) = &options.additional_tag {
            self.buildah
                .output(vec!["tag".to_string(), id.clone(), tag.clone()])
                .with_context(|| format!("tagging image {} as {}", id, tag))?;
        }
        Ok(id)
    }

    fn delete(&self, container: &ContainerHandle) -> Result<()> {
        self.buildah.output(vec!["rm".to_string(), container.name.clone()])?;
        Ok(())
    }
}

/// [`ImageStore`] backed by `buildah`'s local containers-storage.
pub struct BuildahStore {
    buildah: Buildah,
}

impl BuildahStore {
    pub fn new(executor: Arc<dyn CommandExecutor>, storage: StorageOptions) -> Self {
        Self {
            buildah: Buildah { executor, storage },
        }
    }
}

impl ImageStore for BuildahStore {
    fn exists(&self, reference: &str) -> Result<bool> {
        let spec = self.buildah.spec(vec![
            "inspect".to_string(),
            "--type".to_string(),
            "image".to_string(),
            "--format".to_string(),
            "{{.FromImageID}}".to_string(),
            reference.to_string(),
        ]);
        Ok(self.buildah.execute(&spec)?.success())
    }

    // Every buildah invocation opens and releases the store itself.
    fn shutdown(&self, force: bool) -> Result<Vec<String>> {
        trace!(force, "no long-lived store handle to release");
        Ok(Vec::new())
    }
}

/// Removes a temporary file when dropped.
struct TempFileGuard {
    path: Utf8PathBuf,
}

impl TempFileGuard {
    fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("cleaned up temp file: {}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("temp file already removed: {}", self.path);
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path,
                    error_kind = ?e.kind(),
                    "failed to cleanup temp file: {}",
                    e,
                );
            }
        }
    }
}

fn write_ignore_file(excludes: &[String]) -> Result<Utf8PathBuf> {
    let dir = Utf8PathBuf::from_path_buf(std::env::temp_dir()).map_err(|p| {
        RsocistrapError::Validation(format!("temporary directory is not UTF-8: {}", p.display()))
    })?;
    let path = dir.join(format!("{}-{}.ignore", CONTAINER_NAME_PREFIX, uuid::Uuid::new_v4()));
    let mut contents = excludes.join("\n");
    contents.push('\n');
    fs::write(&path, contents).map_err(|e| RsocistrapError::io(path.to_string(), e))?;
    Ok(path)
}

/// Ignore-file contents that exclude everything in the context directory
/// except `sources`, then apply the rule's own `excludes`.
fn ignore_patterns(sources: &[String], excludes: &[String]) -> Vec<String> {
    let mut patterns = Vec::with_capacity(sources.len() + excludes.len() + 1);
    patterns.push("*".to_string());
    patterns.extend(sources.iter().map(|source| format!("!{}", source)));
    patterns.extend(excludes.iter().cloned());
    patterns
}

/// Where `source` lands when the context directory is copied to `destination`.
fn copied_path(destination: &str, source: &str) -> String {
    Utf8Path::new(destination)
        .join(source.trim_start_matches('/'))
        .into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_global_args() {
        let storage = StorageOptions {
            root: Some("/var/lib/images".into()),
            run_root: None,
            driver: Some("vfs".to_string()),
        };
        assert_eq!(
            storage.global_args(),
            vec!["--root=/var/lib/images", "--storage-driver=vfs"]
        );
        assert!(StorageOptions::default().global_args().is_empty());
    }

    #[test]
    fn test_ignore_patterns_reinclude_sources() {
        let sources = vec!["bin".to_string(), "etc/app.conf".to_string()];
        assert_eq!(
            ignore_patterns(&sources, &["*.bak".to_string()]),
            vec!["*", "!bin", "!etc/app.conf", "*.bak"]
        );
    }

    #[test]
    fn test_copied_path() {
        assert_eq!(copied_path("/opt/app", "etc/app.conf"), "/opt/app/etc/app.conf");
        assert_eq!(copied_path("/opt/app/", "bin"), "/opt/app/bin");
        assert_eq!(copied_path("/usr/bin", "/mytool"), "/usr/bin/mytool");
    }

    #[test]
    fn test_ignore_file_is_removed_on_drop() {
        let path = write_ignore_file(&["*.bak".to_string(), "secret".to_string()]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "*.bak\nsecret\n");
        {
            let _guard = TempFileGuard::new(path.clone());
        }
        assert!(!path.exists());
    }
}
