use std::collections::BTreeSet;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::{FindBackend, FindCommandFactory};
use crate::capability::{Capabilities, Capability};
use crate::command::CommandDescriptor;
use crate::container::{NetworkPolicy, WorkingContainer};

/// Strips setuid and setgid bits from files in a working container.
pub struct SpecialFileSweeper {
    factory: Box<dyn FindCommandFactory>,
}

impl SpecialFileSweeper {
    pub fn new(factory: Box<dyn FindCommandFactory>) -> Self {
        Self { factory }
    }

    pub fn backend(&self) -> FindBackend {
        self.factory.backend()
    }

    /// Finds every special file outside `/home`, drops the paths listed in
    /// `excludes` (exact match), and removes the bits from the rest with a
    /// single `chmod`. Nothing is run when no paths remain.
    pub fn unset_special_bits(
        &self,
        container: &WorkingContainer,
        excludes: &BTreeSet<String>,
    ) -> Result<()> {
        let output = container
            .run_command(&self.factory.find_special(), NetworkPolicy::Disabled)
            .with_context(|| format!("searching for special files using {} find", self.backend()))?;

        let targets: Vec<String> = output
            .stdout
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|path| !path.is_empty() && !excludes.contains(*path))
            .map(str::to_string)
            .collect();

        if targets.is_empty() {
            debug!("no special files to modify");
            return Ok(());
        }

        info!("removing SUID and SGID bits from {} file(s)", targets.len());
        let chmod = chmod_command(targets);
        container
            .run_command(&chmod, NetworkPolicy::Disabled)
            .context("unsetting special bits")?;
        Ok(())
    }
}

fn chmod_command(paths: Vec<String>) -> CommandDescriptor {
    let mut argv = Vec::with_capacity(paths.len() + 2);
    argv.push("chmod".to_string());
    argv.push("-s".to_string());
    argv.extend(paths);
    CommandDescriptor::new(
        argv,
        Capabilities::from([Capability::DacReadSearch, Capability::Fowner]),
    )
}
