use anyhow::{Context, Result};
use tracing::debug;

use super::{PackageBackend, PackageCommandFactory};
use crate::command::CommandDescriptor;
use crate::container::{NetworkPolicy, WorkingContainer};

/// Runs package operations in a working container through a command factory.
pub struct PackageManager {
    factory: Box<dyn PackageCommandFactory>,
}

impl PackageManager {
    pub fn new(factory: Box<dyn PackageCommandFactory>) -> Self {
        Self { factory }
    }

    pub fn backend(&self) -> PackageBackend {
        self.factory.backend()
    }

    /// Removes cached package files. Backends without a cache run nothing.
    pub fn clean_caches(&self, container: &WorkingContainer) -> Result<()> {
        run_unless_noop(container, &self.factory.clean_cache(), NetworkPolicy::Disabled)
            .with_context(|| format!("cleaning {} package caches", self.backend()))
    }

    /// Installs `packages`, refreshing the index first where the backend needs it.
    pub fn install(&self, container: &WorkingContainer, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            debug!("no packages to install");
            return Ok(());
        }
        self.refresh_index(container)?;
        run_unless_noop(container, &self.factory.install(packages), NetworkPolicy::Enabled)
            .with_context(|| format!("installing {} packages", self.backend()))
    }

    /// Upgrades pre-installed packages.
    pub fn upgrade(&self, container: &WorkingContainer) -> Result<()> {
        self.refresh_index(container)?;
        run_unless_noop(container, &self.factory.upgrade(), NetworkPolicy::Enabled)
            .with_context(|| format!("upgrading pre-installed {} packages", self.backend()))
    }

    /// Returns the installed package names in the order the tool prints them.
    pub fn list(&self, container: &WorkingContainer) -> Result<Vec<String>> {
        let list = self.factory.list_installed();
        let output = container
            .run_command(&list.command, NetworkPolicy::Disabled)
            .with_context(|| format!("listing installed {} packages", self.backend()))?;

        let text = output.stdout.trim();
        let lines: Vec<&str> = if text.is_empty() {
            Vec::new()
        } else {
            text.lines().collect()
        };
        let packages = (list.parse)(&lines)
            .with_context(|| format!("parsing installed {} packages", self.backend()))?;
        Ok(packages)
    }

    fn refresh_index(&self, container: &WorkingContainer) -> Result<()> {
        if !self.factory.requires_index_refresh() {
            return Ok(());
        }
        run_unless_noop(container, &self.factory.update_index(), NetworkPolicy::Enabled)
            .with_context(|| format!("updating {} package index", self.backend()))
    }
}

fn run_unless_noop(
    container: &WorkingContainer,
    command: &CommandDescriptor,
    network: NetworkPolicy,
) -> Result<()> {
    if command.is_noop() {
        debug!("skipping no-op package command");
        return Ok(());
    }
    container.run_command(command, network)?;
    Ok(())
}
