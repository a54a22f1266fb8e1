//! Build pipeline orchestrator.
//!
//! A build runs in a fixed order against a single working container:
//!
//! 1. **Create** the container from the base image and check its OS
//! 2. **Packages** upgrade, install, clean
//! 3. **User** create the unprivileged user
//! 4. **Copy** host files into the container
//! 5. **Sweep** setuid and setgid bits
//! 6. **Configure** and **commit** the image
//!
//! The working container is deleted afterwards unless it is kept, even when a
//! step failed.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{Profile, SPEC_DIGEST_ANNOTATION};
use crate::container::{
    AddFiles, CommitOptions, ConfigUpdate, ContainerEngine, CreateOptions, ImageStore, PullPolicy,
    WorkingContainer,
};
use crate::error::RsocistrapError;
use crate::find::{self, SpecialFileSweeper};
use crate::package::{self, PackageManager};
use crate::user::{self, UserManager};

/// Execution-wide toggles for a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Digest of the profile file, added as an image annotation when set.
    pub digest: Option<String>,
    /// Overwrite an existing image with the same reference.
    pub force: bool,
    /// Keep the working container after the build.
    pub keep: bool,
    /// Also point `<repository>:latest` at the new image.
    pub latest: bool,
    /// Log the output of every command run in the container.
    pub log_commands: bool,
    /// Pull the base image when it is not in local storage.
    pub pull: bool,
    /// Log installed packages after the package steps.
    pub list_packages: bool,
}

/// Builds one image from a validated profile.
pub struct Pipeline<'a> {
    profile: &'a Profile,
    options: &'a BuildOptions,
    packages: PackageManager,
    users: UserManager,
    sweeper: SpecialFileSweeper,
}

impl<'a> Pipeline<'a> {
    /// Selects the command factories for the profile's backends.
    ///
    /// Fails when a backend is still unknown; nothing has touched the image
    /// store at that point.
    pub fn new(profile: &'a Profile, options: &'a BuildOptions) -> Result<Self, RsocistrapError> {
        Ok(Self {
            profile,
            options,
            packages: PackageManager::new(package::new_command_factory(profile.backends.package)?),
            users: UserManager::new(user::new_command_factory(profile.backends.user)?),
            sweeper: SpecialFileSweeper::new(find::new_command_factory(profile.backends.find)?),
        })
    }

    /// Runs the build and returns the new image ID.
    pub fn run(&self, engine: Arc<dyn ContainerEngine>, store: &dyn ImageStore) -> Result<String> {
        let reference = self.profile.image.reference();
        if store
            .exists(&reference)
            .with_context(|| format!("checking whether {} exists", reference))?
        {
            if !self.options.force {
                return Err(RsocistrapError::ImageExists { reference }.into());
            }
            info!("{} already exists and will be replaced", reference);
        }

        let create = CreateOptions {
            image: self.profile.from.reference(),
            pull: if self.options.pull {
                PullPolicy::IfMissing
            } else {
                PullPolicy::Never
            },
        };
        let env = self
            .profile
            .distro
            .default_env()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let container = WorkingContainer::create(engine, &create, env, self.options.log_commands)?;
        info!("building {} in working container {}", reference, container.name());

        let result = self.run_steps(&container);

        if self.options.keep {
            info!("keeping working container {}", container.name());
        } else {
            let name = container.name().to_string();
            if let Err(e) = container.delete() {
                warn!("failed to delete working container {}: {:#}", name, e);
                warn!("please remove the container manually");
            }
        }

        result
    }

    fn run_steps(&self, container: &WorkingContainer) -> Result<String> {
        let os = container.os().context("checking image OS")?;
        if os != "linux" {
            return Err(RsocistrapError::Validation(format!(
                "expected 'linux' image, got '{}' image",
                os
            ))
            .into());
        }

        self.run_package_steps(container)?;
        self.create_user(container).context("creating nonroot user")?;
        self.copy_files(container).context("copying files")?;

        let special = &self.profile.security.special_files;
        if special.remove_s {
            info!("removing SUID and SGID bits using {} find", self.sweeper.backend());
            self.sweeper
                .unset_special_bits(container, &self.profile.special_file_excludes())
                .context("removing SUID and SGID bits from files")?;
        }

        container
            .configure(&self.config_update())
            .context("configuring image")?;

        let image = &self.profile.image;
        let commit = CommitOptions {
            reference: image.reference(),
            additional_tag: (self.options.latest && image.tag != "latest")
                .then(|| format!("{}:latest", image.repository)),
            keep_history: image.keep_history,
        };
        let id = container.commit(&commit).context("committing image")?;
        info!("committed {} as {}", commit.reference, id);
        Ok(id)
    }

    fn run_package_steps(&self, container: &WorkingContainer) -> Result<()> {
        let spec = &self.profile.packages;
        let backend = self.packages.backend();
        if spec.upgrade {
            info!("upgrading packages using {}", backend);
            self.packages
                .upgrade(container)
                .context("upgrading packages")?;
        }
        if !spec.install.is_empty() {
            info!("installing {} package(s) using {}", spec.install.len(), backend);
            self.packages
                .install(container, &spec.install)
                .context("installing packages")?;
        }
        if spec.clean {
            info!("cleaning package caches using {}", backend);
            self.packages
                .clean_caches(container)
                .context("cleaning package caches")?;
        }
        if self.options.list_packages {
            let installed = self
                .packages
                .list(container)
                .context("listing packages")?;
            info!("{} installed package(s): {}", installed.len(), installed.join(" "));
        }
        Ok(())
    }

    fn create_user(&self, container: &WorkingContainer) -> Result<()> {
        let Some(spec) = &self.profile.user else {
            return Ok(());
        };
        let mut options = spec.create_options();
        if let Some(shell) = &spec.login_shell {
            let default_shell = self.profile.distro.default_shell();
            options.login_shell = Some(if shell == default_shell {
                shell.clone()
            } else {
                let path = container.resolve_executable(shell)?;
                debug!("resolved login shell {} to {}", shell, path);
                path
            });
        }
        info!("creating user {} using {}", spec.name, self.users.backend());
        self.users.create_user(container, &spec.name, &options)
    }

    fn copy_files(&self, container: &WorkingContainer) -> Result<()> {
        for rule in &self.profile.copy {
            debug!("copying {} source(s) from {} to {}", rule.srcs.len(), rule.base, rule.dest);
            let files = AddFiles {
                destination: rule.dest.clone(),
                context_dir: rule.base.clone(),
                sources: rule.srcs.clone(),
                excludes: rule.excludes.clone(),
                owner: rule.owner.clone(),
                mode: rule.mode_bits()?,
                strip_special_bits: rule.remove_s,
            };
            container
                .add_files(&files)
                .with_context(|| format!("copying files to {}", rule.dest))?;
        }
        Ok(())
    }

    fn config_update(&self) -> ConfigUpdate {
        let config = &self.profile.config;
        let mut annotations = config.annotations.clone();
        if let Some(digest) = &self.options.digest {
            annotations.insert(SPEC_DIGEST_ANNOTATION.to_string(), digest.clone());
        }
        ConfigUpdate {
            clear: config.clear,
            os: "linux".to_string(),
            annotations,
            author: config.author.clone(),
            cmd: config.cmd.clone(),
            created_by: config.created_by.clone(),
            entrypoint: config.entrypoint.clone(),
            env: config.env.clone(),
            labels: config.labels.clone(),
            ports: config.ports.iter().map(ToString::to_string).collect(),
            user: self.profile.user.as_ref().map(|u| u.name.clone()),
            work_dir: config.work_dir.clone(),
        }
    }
}

/// Builds `profile` and returns the new image ID.
pub fn build(
    profile: &Profile,
    engine: Arc<dyn ContainerEngine>,
    store: &dyn ImageStore,
    options: &BuildOptions,
) -> Result<String> {
    Pipeline::new(profile, options)?.run(engine, store)
}
