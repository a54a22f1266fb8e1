//! Void Linux's X Binary Package System.

use super::{ListCommand, PackageBackend, PackageCommandFactory, argv_with_packages};
use crate::capability::{Capabilities, Capability};
use crate::command::{CommandDescriptor, to_argv};
use crate::error::RsocistrapError;

#[derive(Debug, Clone, Copy, Default)]
pub struct XbpsCommandFactory;

impl PackageCommandFactory for XbpsCommandFactory {
    fn backend(&self) -> PackageBackend {
        PackageBackend::Xbps
    }

    fn clean_cache(&self) -> CommandDescriptor {
        CommandDescriptor::new(
            to_argv(&["xbps-remove", "--clean-cache", "--yes"]),
            Capabilities::none(),
        )
    }

    // xbps writes into its root-owned package database directory.
    fn install(&self, packages: &[String]) -> CommandDescriptor {
        CommandDescriptor::new(
            argv_with_packages(&["xbps-install", "--yes"], packages),
            [Capability::DacOverride],
        )
    }

    fn list_installed(&self) -> ListCommand {
        ListCommand {
            command: CommandDescriptor::new(
                to_argv(&["xbps-query", "--list-pkgs"]),
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
            to_argv(&["xbps-install", "--sync", "--update", "--yes"]),
            [Capability::DacOverride],
        )
    }
}

/// Line format: `state pkgver description...`, e.g. `ii bash-5.2.21_1 GNU bash shell`.
fn parse_installed(lines: &[&str]) -> Result<Vec<String>, RsocistrapError> {
    lines
        .iter()
        .map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                return Err(RsocistrapError::Parse(format!(
                    "expected at least 3 fields in line {:?}",
                    line
                )));
            }
            match fields[1].rsplit_once('-') {
                Some((name, _version)) if !name.is_empty() => Ok(name.to_string()),
                _ => Err(RsocistrapError::Parse(format!(
                    "expected format 'name-version' for field {:?}",
                    fields[1]
                ))),
            }
        })
        .collect()
}
