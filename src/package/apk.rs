//! Alpine Package Keeper (`apk`), used by Alpine and Chimera.

use super::{ListCommand, PackageBackend, PackageCommandFactory, argv_with_packages};
use crate::capability::Capabilities;
use crate::command::{CommandDescriptor, to_argv};
use crate::error::RsocistrapError;

/// `apk` keeps no package cache when invoked with `--no-cache`, so cleaning
/// and index refreshes are no-ops. No capabilities are needed because apk
/// writes its database and package files as the (namespaced) root user.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApkCommandFactory;

impl PackageCommandFactory for ApkCommandFactory {
    fn backend(&self) -> PackageBackend {
        PackageBackend::Apk
    }

    fn clean_cache(&self) -> CommandDescriptor {
        CommandDescriptor::noop()
    }

    fn install(&self, packages: &[String]) -> CommandDescriptor {
        CommandDescriptor::new(
            argv_with_packages(&["apk", "--no-cache", "--no-progress", "--quiet", "add"], packages),
            Capabilities::none(),
        )
    }

    fn list_installed(&self) -> ListCommand {
        ListCommand {
            command: CommandDescriptor::new(
                to_argv(&[
                    "apk",
                    "--no-interactive",
                    "--no-network",
                    "--quiet",
                    "list",
                    "--installed",
                ]),
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
            to_argv(&["apk", "--no-cache", "--no-progress", "--quiet", "upgrade"]),
            Capabilities::none(),
        )
    }
}

/// Line format: `name-version-revision arch {origin} (licenses) [status]`.
fn parse_installed(lines: &[&str]) -> Result<Vec<String>, RsocistrapError> {
    lines
        .iter()
        .map(|line| {
            let (package, _) = line.split_once(' ').ok_or_else(|| {
                RsocistrapError::Parse(format!("expected space delimiter in line {:?}", line))
            })?;
            let mut parts = package.rsplitn(3, '-');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(_revision), Some(_version), Some(name)) if !name.is_empty() => {
                    Ok(name.to_string())
                }
                _ => Err(RsocistrapError::Parse(format!(
                    "expected format 'name-version-revision' for field {:?}",
                    package
                ))),
            }
        })
        .collect()
}
