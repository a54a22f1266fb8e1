//! Debian's `apt`.

use super::{
    ListCommand, PackageBackend, PackageCommandFactory, argv_with_packages,
    parse_one_name_per_line,
};
use crate::capability::{Capabilities, Capability};
use crate::command::{CommandDescriptor, to_argv};

/// apt drops privileges to the `_apt` user for downloads (`CAP_SETUID`,
/// `CAP_SETGID`), chowns its partial download directories (`CAP_CHOWN`),
/// and dpkg writes files owned by other users (`CAP_DAC_OVERRIDE`,
/// `CAP_FOWNER`).
fn mutating_capabilities() -> Capabilities {
    Capabilities::from([
        Capability::Chown,
        Capability::DacOverride,
        Capability::Fowner,
        Capability::Setgid,
        Capability::Setuid,
    ])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AptCommandFactory;

impl PackageCommandFactory for AptCommandFactory {
    fn backend(&self) -> PackageBackend {
        PackageBackend::Apt
    }

    fn clean_cache(&self) -> CommandDescriptor {
        CommandDescriptor::new(
            to_argv(&["apt", "--quiet", "clean"]),
            [Capability::Chown, Capability::DacOverride, Capability::Fowner],
        )
    }

    fn install(&self, packages: &[String]) -> CommandDescriptor {
        CommandDescriptor::new(
            argv_with_packages(&["apt", "--quiet", "--yes", "install"], packages),
            mutating_capabilities(),
        )
    }

    fn list_installed(&self) -> ListCommand {
        ListCommand {
            command: CommandDescriptor::new(
                to_argv(&["apt-cache", "pkgnames"]),
                Capabilities::none(),
            ),
            parse: parse_one_name_per_line,
        }
    }

    fn update_index(&self) -> CommandDescriptor {
        CommandDescriptor::new(
            to_argv(&["apt", "--quiet", "update"]),
            mutating_capabilities(),
        )
    }

    fn upgrade(&self) -> CommandDescriptor {
        CommandDescriptor::new(
            to_argv(&["apt", "--quiet", "--yes", "upgrade"]),
            mutating_capabilities(),
        )
    }

    fn requires_index_refresh(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_argv_and_capabilities() {
        let desc = AptCommandFactory.install(&["git".to_string()]);
        assert_eq!(desc.argv, vec!["apt", "--quiet", "--yes", "install", "git"]);
        assert_eq!(
            desc.capabilities.names(),
            vec!["CAP_CHOWN", "CAP_DAC_OVERRIDE", "CAP_FOWNER", "CAP_SETGID", "CAP_SETUID"]
        );
    }

    #[test]
    fn test_clean_does_not_need_setuid() {
        let desc = AptCommandFactory.clean_cache();
        assert_eq!(desc.argv, vec!["apt", "--quiet", "clean"]);
        assert!(!desc.capabilities.contains(Capability::Setuid));
        assert!(!desc.capabilities.contains(Capability::Setgid));
    }

    #[test]
    fn test_update_index_is_not_noop() {
        let desc = AptCommandFactory.update_index();
        assert_eq!(desc.argv, vec!["apt", "--quiet", "update"]);
    }

    #[test]
    fn test_list_is_read_only() {
        let list = AptCommandFactory.list_installed();
        assert_eq!(list.command.argv, vec!["apt-cache", "pkgnames"]);
        assert!(list.command.capabilities.is_empty());
        assert_eq!((list.parse)(&["zlib1g", "bash"]).unwrap(), vec!["zlib1g", "bash"]);
    }
}
