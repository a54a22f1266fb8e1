//! Arch Linux's `pacman`.

use super::{
    ListCommand, PackageBackend, PackageCommandFactory, argv_with_packages,
    parse_one_name_per_line,
};
use crate::capability::{Capabilities, Capability};
use crate::command::{CommandDescriptor, to_argv};

/// pacman chowns extracted files (`CAP_CHOWN`), writes into directories it
/// does not own (`CAP_DAC_OVERRIDE`, `CAP_FOWNER`) and chroots into the
/// root to run install scriptlets (`CAP_SYS_CHROOT`).
fn mutating_capabilities() -> Capabilities {
    Capabilities::from([
        Capability::Chown,
        Capability::DacOverride,
        Capability::Fowner,
        Capability::SysChroot,
    ])
}

/// The sync database is refreshed by `--refresh` during upgrades and is
/// read directly during installs, so index updates are a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacmanCommandFactory;

impl PackageCommandFactory for PacmanCommandFactory {
    fn backend(&self) -> PackageBackend {
        PackageBackend::Pacman
    }

    fn clean_cache(&self) -> CommandDescriptor {
        CommandDescriptor::new(
            to_argv(&["pacman", "--sync", "--clean", "--clean", "--noconfirm", "--quiet"]),
            Capabilities::none(),
        )
    }

    fn install(&self, packages: &[String]) -> CommandDescriptor {
        CommandDescriptor::new(
            argv_with_packages(
                &["pacman", "--sync", "--noconfirm", "--noprogressbar", "--quiet"],
                packages,
            ),
            mutating_capabilities(),
        )
    }

    fn list_installed(&self) -> ListCommand {
        ListCommand {
            command: CommandDescriptor::new(
                to_argv(&["pacman", "--color", "never", "--query", "--quiet"]),
                Capabilities::none(),
            ),
            parse: parse_one_name_per_line,
        }
    }

    fn update_index(&self) -> CommandDescriptor {
        CommandDescriptor::noop()
    }

    fn upgrade(&self) -> CommandDescriptor {
        CommandDescriptor::new(
            to_argv(&[
                "pacman",
                "--sync",
                "--sysupgrade",
                "--refresh",
                "--noconfirm",
                "--noprogressbar",
                "--quiet",
            ]),
            mutating_capabilities(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_capabilities_include_chroot() {
        let desc = PacmanCommandFactory.install(&["git".to_string()]);
        assert_eq!(desc.argv.last().map(String::as_str), Some("git"));
        assert!(desc.capabilities.contains(Capability::SysChroot));
        assert_eq!(desc.capabilities.len(), 4);
    }

    #[test]
    fn test_update_index_is_noop() {
        let desc = PacmanCommandFactory.update_index();
        assert!(desc.is_noop());
        assert!(desc.capabilities.is_empty());
    }

    #[test]
    fn test_clean_is_unprivileged() {
        assert!(PacmanCommandFactory.clean_cache().capabilities.is_empty());
    }
}
