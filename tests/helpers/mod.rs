//! Shared test doubles: a recording container engine, an in-memory image
//! store, a recording host command executor, and profile builders.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use rsocistrap::capability::Capabilities;
use rsocistrap::config::{BaseImage, ImageSpec, Profile};
use rsocistrap::container::{
    AddFiles, CommitOptions, ConfigUpdate, ContainerEngine, ContainerHandle, CreateOptions,
    ImageStore, NetworkPolicy, RunOptions, RunOutput, WorkingContainer,
};
use rsocistrap::distro::Distro;
use rsocistrap::executor::{CommandExecutor, CommandSpec, ExecutionResult};

pub const CONTAINER_ID: &str = "0123456789abcdef";
pub const CONTAINER_NAME: &str = "rsocistrap-test";
pub const IMAGE_ID: &str = "sha256:4f2a9c0e1b7d";

/// One operation observed by [`MockEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(CreateOptions),
    Os,
    Run {
        argv: Vec<String>,
        network: NetworkPolicy,
        capabilities: Capabilities,
        env: Vec<(String, String)>,
        log_output: bool,
    },
    AddFiles(AddFiles),
    Configure(ConfigUpdate),
    Commit(CommitOptions),
    Delete,
}

impl Call {
    /// Short label used when asserting on operation order.
    pub fn label(&self) -> String {
        match self {
            Call::Create(_) => "create".to_string(),
            Call::Os => "os".to_string(),
            Call::Run { argv, .. } if is_lookup(argv) => format!("lookup {}", argv[4]),
            Call::Run { argv, .. } => format!("run {}", argv.join(" ")),
            Call::AddFiles(files) => format!("add {}", files.destination),
            Call::Configure(_) => "configure".to_string(),
            Call::Commit(options) => format!("commit {}", options.reference),
            Call::Delete => "delete".to_string(),
        }
    }
}

fn is_lookup(argv: &[String]) -> bool {
    argv.len() == 5 && argv[0] == "/bin/sh" && argv[2].starts_with("command -v")
}

/// Container engine that records every call and answers from canned data.
#[derive(Default)]
pub struct MockEngine {
    calls: Mutex<Vec<Call>>,
    /// OS reported for the working container; `"linux"` when unset.
    pub os: Mutex<Option<String>>,
    /// Executables resolvable through `command -v`.
    pub executables: Mutex<BTreeMap<String, String>>,
    /// Stdout returned for commands whose argv[0] matches.
    pub stdout: Mutex<BTreeMap<String, String>>,
    /// argv[0] of commands that exit with status 1.
    pub failing: Mutex<BTreeSet<String>>,
    pub fail_create: Mutex<bool>,
    pub fail_add_files: Mutex<bool>,
    pub fail_delete: Mutex<bool>,
}

#[allow(dead_code)]
impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_executable(self: &Arc<Self>, name: &str, path: &str) -> Arc<Self> {
        self.executables
            .lock()
            .unwrap()
            .insert(name.to_string(), path.to_string());
        Arc::clone(self)
    }

    pub fn with_stdout(self: &Arc<Self>, program: &str, stdout: &str) -> Arc<Self> {
        self.stdout
            .lock()
            .unwrap()
            .insert(program.to_string(), stdout.to_string());
        Arc::clone(self)
    }

    pub fn with_failing(self: &Arc<Self>, program: &str) -> Arc<Self> {
        self.failing.lock().unwrap().insert(program.to_string());
        Arc::clone(self)
    }

    pub fn with_os(self: &Arc<Self>, os: &str) -> Arc<Self> {
        *self.os.lock().unwrap() = Some(os.to_string());
        Arc::clone(self)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().iter().map(Call::label).collect()
    }

    /// Commands run in the container, excluding executable lookups.
    pub fn runs(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Run { argv, .. } if !is_lookup(argv)))
            .collect()
    }

    /// The argv of every non-lookup command run in the container.
    pub fn run_argvs(&self) -> Vec<Vec<String>> {
        self.runs()
            .into_iter()
            .filter_map(|c| match c {
                Call::Run { argv, .. } => Some(argv),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ContainerEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn create(&self, options: &CreateOptions) -> Result<ContainerHandle> {
        self.record(Call::Create(options.clone()));
        if *self.fail_create.lock().unwrap() {
            bail!("image not known: {}", options.image);
        }
        Ok(ContainerHandle {
            id: CONTAINER_ID.to_string(),
            name: CONTAINER_NAME.to_string(),
        })
    }

    fn os(&self, _container: &ContainerHandle) -> Result<String> {
        self.record(Call::Os);
        Ok(self
            .os
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "linux".to_string()))
    }

    fn run(
        &self,
        _container: &ContainerHandle,
        argv: &[String],
        options: &RunOptions,
    ) -> Result<RunOutput> {
        self.record(Call::Run {
            argv: argv.to_vec(),
            network: options.network,
            capabilities: options.capabilities.clone(),
            env: options.env.clone(),
            log_output: options.log_output,
        });

        if is_lookup(argv) {
            return Ok(match self.executables.lock().unwrap().get(&argv[4]) {
                Some(path) => RunOutput {
                    code: Some(0),
                    stdout: format!("{}\n", path),
                    stderr: String::new(),
                },
                None => RunOutput {
                    code: Some(1),
                    ..Default::default()
                },
            });
        }

        let program = argv.first().cloned().unwrap_or_default();
        if self.failing.lock().unwrap().contains(&program) {
            return Ok(RunOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: format!("{}: simulated failure\n", program),
            });
        }
        Ok(RunOutput {
            code: Some(0),
            stdout: self
                .stdout
                .lock()
                .unwrap()
                .get(&program)
                .cloned()
                .unwrap_or_default(),
            stderr: String::new(),
        })
    }

    fn add_files(&self, _container: &ContainerHandle, files: &AddFiles) -> Result<()> {
        self.record(Call::AddFiles(files.clone()));
        if *self.fail_add_files.lock().unwrap() {
            bail!("no such file or directory: {}", files.context_dir);
        }
        Ok(())
    }

    fn configure(&self, _container: &ContainerHandle, update: &ConfigUpdate) -> Result<()> {
        self.record(Call::Configure(update.clone()));
        Ok(())
    }

    fn commit(&self, _container: &ContainerHandle, options: &CommitOptions) -> Result<String> {
        self.record(Call::Commit(options.clone()));
        Ok(IMAGE_ID.to_string())
    }

    fn delete(&self, _container: &ContainerHandle) -> Result<()> {
        self.record(Call::Delete);
        if *self.fail_delete.lock().unwrap() {
            bail!("container {} is in use", CONTAINER_NAME);
        }
        Ok(())
    }
}

/// Image store holding a fixed set of references.
#[derive(Default)]
pub struct MockStore {
    pub images: BTreeSet<String>,
    pub checked: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockStore {
    pub fn with_image(reference: &str) -> Self {
        Self {
            images: BTreeSet::from([reference.to_string()]),
            ..Default::default()
        }
    }
}

impl ImageStore for MockStore {
    fn exists(&self, reference: &str) -> Result<bool> {
        self.checked.lock().unwrap().push(reference.to_string());
        Ok(self.images.contains(reference))
    }

    fn shutdown(&self, _force: bool) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Creates a working container on `engine` with no extra environment.
#[allow(dead_code)]
pub fn working_container(engine: &Arc<MockEngine>) -> WorkingContainer {
    let engine: Arc<dyn ContainerEngine> = engine.clone();
    WorkingContainer::create(
        engine,
        &CreateOptions {
            image: "docker.io/library/alpine:3.20".to_string(),
            pull: Default::default(),
        },
        Vec::new(),
        false,
    )
    .expect("mock create should succeed")
}

/// Builds a filled profile with only the required fields set.
#[allow(dead_code)]
pub fn minimal_profile(distro: Distro) -> Profile {
    let mut profile = Profile {
        distro,
        image: ImageSpec {
            repository: "localhost/test".to_string(),
            tag: "1.0".to_string(),
            keep_history: false,
        },
        from: BaseImage {
            repository: "docker.io/library/base".to_string(),
            tag: Some("latest".to_string()),
            digest: None,
        },
        backends: Default::default(),
        packages: Default::default(),
        user: None,
        copy: Vec::new(),
        security: Default::default(),
        config: Default::default(),
        storage: Default::default(),
    };
    profile.fill();
    profile
}

/// One host command observed by [`RecordingExecutor`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub command: String,
    pub args: Vec<String>,
    pub log_label: Option<String>,
}

/// Host executor that records specs and replays queued results.
///
/// Commands without a queued response succeed with empty output.
#[derive(Default)]
pub struct RecordingExecutor {
    recorded: Mutex<Vec<Recorded>>,
    responses: Mutex<VecDeque<(i32, String, String)>>,
}

#[allow(dead_code)]
impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues the exit code, stdout and stderr for the next command.
    pub fn respond(&self, code: i32, stdout: &str, stderr: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back((code, stdout.to_string(), stderr.to_string()));
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    /// The arguments of every recorded command.
    pub fn args(&self) -> Vec<Vec<String>> {
        self.recorded().into_iter().map(|r| r.args).collect()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        self.recorded.lock().unwrap().push(Recorded {
            command: spec.command.clone(),
            args: spec.args.clone(),
            log_label: spec.log_label.clone(),
        });
        let (code, stdout, stderr) = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(ExecutionResult {
            status: ExitStatus::from_raw(code << 8),
            stdout,
            stderr,
        })
    }
}
