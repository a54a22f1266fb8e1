//! `find` implementations used to locate setuid and setgid files.

use std::str::FromStr;

use strum::{Display, EnumIter};

use crate::backend::parse_identifier;
use crate::command::CommandDescriptor;
use crate::error::RsocistrapError;
use crate::serde_helpers::impl_display_fromstr_serde;

mod bsd;
mod busybox;
mod gnu;
mod sweeper;

pub use bsd::BsdCommandFactory;
pub use busybox::BusyBoxCommandFactory;
pub use gnu::GnuCommandFactory;
pub use sweeper::SpecialFileSweeper;

/// Directory pruned from the search. Home directories are user-owned and
/// are never swept automatically.
pub(crate) const PRUNED_DIR: &str = "/home";

/// A `find` implementation. `Unknown` is the unset value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum FindBackend {
    #[default]
    #[strum(to_string = "unknown")]
    Unknown,
    #[strum(to_string = "BSD")]
    Bsd,
    BusyBox,
    #[strum(to_string = "GNU")]
    Gnu,
}

impl FromStr for FindBackend {
    type Err = RsocistrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_identifier("find", s, &[])
    }
}

impl_display_fromstr_serde!(FindBackend, expecting: "a find backend name such as \"GNU\"");

/// Builds the command that lists setuid and setgid regular files.
///
/// The search stays on the root filesystem, so pseudo and device
/// filesystems mounted below `/` are never traversed.
pub trait FindCommandFactory: Send + Sync {
    /// The backend this factory builds commands for.
    fn backend(&self) -> FindBackend;

    /// Prints every setuid or setgid file outside `/home`, one per line.
    fn find_special(&self) -> CommandDescriptor;
}

/// Returns the command factory for `backend`. Fails for the unset value.
pub fn new_command_factory(
    backend: FindBackend,
) -> Result<Box<dyn FindCommandFactory>, RsocistrapError> {
    match backend {
        FindBackend::Bsd => Ok(Box::new(BsdCommandFactory)),
        FindBackend::BusyBox => Ok(Box::new(BusyBoxCommandFactory)),
        FindBackend::Gnu => Ok(Box::new(GnuCommandFactory)),
        FindBackend::Unknown => Err(RsocistrapError::UnsupportedBackend {
            axis: "find",
            name: backend.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_factory_fails_only_for_unknown() {
        for backend in FindBackend::iter() {
            match new_command_factory(backend) {
                Ok(factory) => assert_eq!(factory.backend(), backend),
                Err(err) => {
                    assert_eq!(backend, FindBackend::Unknown);
                    assert_eq!(err.to_string(), "unsupported find backend: unknown");
                }
            }
        }
    }

    #[test]
    fn test_parse_round_trip_case_insensitive() {
        for backend in FindBackend::iter().filter(|b| *b != FindBackend::Unknown) {
            let name = backend.to_string();
            assert_eq!(name.to_lowercase().parse::<FindBackend>().unwrap(), backend);
            assert_eq!(name.parse::<FindBackend>().unwrap(), backend);
        }
        assert!("unknown".parse::<FindBackend>().is_err());
    }

    #[test]
    fn test_every_search_prunes_home_and_matches_files() {
        for backend in FindBackend::iter().filter(|b| *b != FindBackend::Unknown) {
            let desc = new_command_factory(backend).unwrap().find_special();
            assert_eq!(desc.program(), "find");
            let argv = desc.argv.join(" ");
            assert!(argv.contains("-path /home -prune -o"), "{}: {}", backend, argv);
            assert!(argv.contains("-type f"), "{}: {}", backend, argv);
            assert!(argv.ends_with("-print"), "{}: {}", backend, argv);
        }
    }
}
