//! Fedora's `dnf`.

use super::{ListCommand, PackageBackend, PackageCommandFactory, argv_with_packages};
use crate::capability::{Capabilities, Capability};
use crate::command::{CommandDescriptor, to_argv};
use crate::error::RsocistrapError;

/// rpm chowns installed files (`CAP_CHOWN`), writes into directories owned
/// by other users (`CAP_DAC_OVERRIDE`) and applies file capabilities from
/// package headers (`CAP_SETFCAP`).
fn mutating_capabilities() -> Capabilities {
    Capabilities::from([Capability::Chown, Capability::DacOverride, Capability::Setfcap])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DnfCommandFactory;

impl PackageCommandFactory for DnfCommandFactory {
    fn backend(&self) -> PackageBackend {
        PackageBackend::Dnf
    }

    fn clean_cache(&self) -> CommandDescriptor {
        CommandDescriptor::new(to_argv(&["dnf", "--quiet", "clean", "all"]), Capabilities::none())
    }

    fn install(&self, packages: &[String]) -> CommandDescriptor {
        CommandDescriptor::new(
            argv_with_packages(
                &["dnf", "--assumeyes", "--quiet", "--setopt=install_weak_deps=False", "install"],
                packages,
            ),
            mutating_capabilities(),
        )
    }

    fn list_installed(&self) -> ListCommand {
        ListCommand {
            command: CommandDescriptor::new(
                to_argv(&["dnf", "--color=never", "--quiet", "list", "--installed"]),
                Capabilities::none(),
            ),
            parse: parse_installed,
        }
    }

    fn update_index(&self) -> CommandDescriptor {
        CommandDescriptor::noop()
    }

    fn upgrade(&self) -> CommandDescriptor {
        CommandDescriptor::new(
            to_argv(&["dnf", "--assumeyes", "--quiet", "--refresh", "upgrade"]),
            mutating_capabilities(),
        )
    }
}

/// The first line is a header; every other line is `name.arch version repo`.
fn parse_installed(lines: &[&str]) -> Result<Vec<String>, RsocistrapError> {
    lines
        .iter()
        .skip(1)
        .map(|line| {
            let (package, _) = line.split_once(' ').ok_or_else(|| {
                RsocistrapError::Parse(format!("expected space delimiter in line {:?}", line))
            })?;
            match package.rsplit_once('.') {
                Some((name, _arch)) if !name.is_empty() => Ok(name.to_string()),
                _ => Err(RsocistrapError::Parse(format!(
                    "expected format 'name.arch' for field {:?}",
                    package
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_argv_and_capabilities() {
        let desc = DnfCommandFactory.install(&["git".to_string()]);
        assert_eq!(
            desc.argv,
            vec!["dnf", "--assumeyes", "--quiet", "--setopt=install_weak_deps=False", "install", "git"]
        );
        assert_eq!(desc.capabilities.names(), vec!["CAP_CHOWN", "CAP_DAC_OVERRIDE", "CAP_SETFCAP"]);
    }

    #[test]
    fn test_update_index_is_noop() {
        assert!(DnfCommandFactory.update_index().is_noop());
    }

    #[test]
    fn test_parse_skips_header_and_strips_arch() {
        let lines = [
            "Installed Packages",
            "glibc-minimal-langpack.x86_64       2.39-22.fc40        @koji-override-0",
            "python3.11.x86_64                   3.11.9-2.fc40       @updates",
        ];
        assert_eq!(
            parse_installed(&lines).unwrap(),
            vec!["glibc-minimal-langpack", "python3.11"]
        );
    }

    #[test]
    fn test_parse_header_only_is_empty() {
        assert!(parse_installed(&["Installed Packages"]).unwrap().is_empty());
        assert!(parse_installed(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_missing_arch() {
        let err = parse_installed(&["Installed Packages", "bash 5.2 @fedora"]).unwrap_err();
        assert!(err.to_string().contains("name.arch"));
    }
}
