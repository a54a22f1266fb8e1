//! openSUSE's `zypper`.

use super::{ListCommand, PackageBackend, PackageCommandFactory, argv_with_packages};
use crate::capability::Capabilities;
use crate::command::{CommandDescriptor, to_argv};
use crate::error::RsocistrapError;

/// zypper refreshes repositories on demand during install and patch, so
/// index updates are a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZypperCommandFactory;

impl PackageCommandFactory for ZypperCommandFactory {
    fn backend(&self) -> PackageBackend {
        PackageBackend::Zypper
    }

    fn clean_cache(&self) -> CommandDescriptor {
        CommandDescriptor::new(
            to_argv(&["zypper", "--non-interactive", "--quiet", "clean", "--all"]),
            Capabilities::none(),
        )
    }

    fn install(&self, packages: &[String]) -> CommandDescriptor {
        CommandDescriptor::new(
            argv_with_packages(
                &["zypper", "--non-interactive", "--quiet", "install", "--no-recommends"],
                packages,
            ),
            Capabilities::none(),
        )
    }

    fn list_installed(&self) -> ListCommand {
        ListCommand {
            command: CommandDescriptor::new(
                to_argv(&[
                    "zypper",
                    "--non-interactive",
                    "--quiet",
                    "--terse",
                    "--no-remote",
                    "packages",
                    "--installed-only",
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
            to_argv(&["zypper", "--non-interactive", "--quiet", "patch"]),
            Capabilities::none(),
        )
    }
}

/// Two header lines, then `status | repo | name | version | arch` rows.
fn parse_installed(lines: &[&str]) -> Result<Vec<String>, RsocistrapError> {
    lines
        .iter()
        .skip(2)
        .map(|line| {
            let fields: Vec<&str> = line.split('|').collect();
            if fields.len() != 5 {
                return Err(RsocistrapError::Parse(format!(
                    "expected 5 fields in line {:?}",
                    line
                )));
            }
            Ok(fields[2].trim().to_string())
        })
        .collect()
}
