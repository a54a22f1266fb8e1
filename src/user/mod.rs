//! User and group management backends.

use std::str::FromStr;

use strum::{Display, EnumIter};

use crate::backend::parse_identifier;
use crate::command::CommandDescriptor;
use crate::error::RsocistrapError;
use crate::serde_helpers::impl_display_fromstr_serde;

mod busybox;
mod manager;
mod shadow;

pub use busybox::BusyBoxCommandFactory;
pub use manager::UserManager;
pub use shadow::ShadowCommandFactory;

/// A user and group management utility. `Unknown` is the unset value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum UserBackend {
    #[default]
    #[strum(to_string = "unknown")]
    Unknown,
    BusyBox,
    #[strum(to_string = "shadow-utils")]
    Shadow,
}

impl FromStr for UserBackend {
    type Err = RsocistrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_identifier("user", s, &[("shadow", Self::Shadow)])
    }
}

impl_display_fromstr_serde!(UserBackend, expecting: "a user backend name such as \"shadow-utils\"");

/// Options for creating the unprivileged user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateUserOptions {
    /// Numeric user ID; 0 lets the tool assign one.
    pub id: u32,
    /// GECOS field text.
    pub comment: Option<String>,
    /// Create a primary group named after the user.
    pub user_group: bool,
    /// Supplementary groups.
    pub groups: Vec<String>,
    pub create_home: bool,
    /// Absolute path of the login shell.
    pub login_shell: Option<String>,
}

/// Builds user management command lines and their required capabilities.
pub trait UserCommandFactory: Send + Sync {
    /// The backend this factory builds commands for.
    fn backend(&self) -> UserBackend;

    /// Creates the user described by `options`.
    ///
    /// `cache_helper_present` reports whether [`Self::cache_helper`] was found
    /// in the container; backends without a helper ignore it.
    fn create_user(
        &self,
        name: &str,
        options: &CreateUserOptions,
        cache_helper_present: bool,
    ) -> CommandDescriptor;

    /// A no-op where group membership is set when the user is created.
    fn add_user_to_group(&self, user: &str, group: &str) -> CommandDescriptor;

    /// An executable that user creation forks into when it is installed.
    fn cache_helper(&self) -> Option<&'static str> {
        None
    }
}

/// Returns the command factory for `backend`. Fails for the unset value.
pub fn new_command_factory(
    backend: UserBackend,
) -> Result<Box<dyn UserCommandFactory>, RsocistrapError> {
    match backend {
        UserBackend::BusyBox => Ok(Box::new(BusyBoxCommandFactory)),
        UserBackend::Shadow => Ok(Box::new(ShadowCommandFactory)),
        UserBackend::Unknown => Err(RsocistrapError::UnsupportedBackend {
            axis: "user",
            name: backend.to_string(),
        }),
    }
}
