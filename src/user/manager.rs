use anyhow::{Context, Result};
use tracing::debug;

use super::{CreateUserOptions, UserBackend, UserCommandFactory};
use crate::container::{NetworkPolicy, WorkingContainer};
use crate::error::RsocistrapError;

/// Creates users in a working container through a command factory.
pub struct UserManager {
    factory: Box<dyn UserCommandFactory>,
}

impl UserManager {
    pub fn new(factory: Box<dyn UserCommandFactory>) -> Self {
        Self { factory }
    }

    pub fn backend(&self) -> UserBackend {
        self.factory.backend()
    }

    /// Creates `name`, then adds it to its own group and each supplementary
    /// group in turn. A failing step stops the sequence; earlier steps are
    /// not rolled back.
    pub fn create_user(
        &self,
        container: &WorkingContainer,
        name: &str,
        options: &CreateUserOptions,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(
                RsocistrapError::Validation("user name must not be empty".to_string()).into(),
            );
        }

        let cache_helper_present = self.probe_cache_helper(container)?;
        let command = self.factory.create_user(name, options, cache_helper_present);
        container
            .run_command(&command, NetworkPolicy::Disabled)
            .with_context(|| format!("creating user using {}", self.backend()))?;

        if options.user_group {
            self.add_user_to_group(container, name, name)?;
        }
        for group in &options.groups {
            self.add_user_to_group(container, name, group)?;
        }
        Ok(())
    }

    fn probe_cache_helper(&self, container: &WorkingContainer) -> Result<bool> {
        let Some(helper) = self.factory.cache_helper() else {
            return Ok(false);
        };
        let found = container
            .find_executable(helper)
            .with_context(|| format!("looking up {}", helper))?;
        match found {
            Some(path) => {
                debug!("found {} at {}", helper, path);
                Ok(true)
            }
            None => {
                debug!("{} not found; skipping cache invalidation", helper);
                Ok(false)
            }
        }
    }

    fn add_user_to_group(
        &self,
        container: &WorkingContainer,
        user: &str,
        group: &str,
    ) -> Result<()> {
        let command = self.factory.add_user_to_group(user, group);
        if command.is_noop() {
            return Ok(());
        }
        container
            .run_command(&command, NetworkPolicy::Disabled)
            .with_context(|| format!("adding user to group {} using {}", group, self.backend()))?;
        Ok(())
    }
}
