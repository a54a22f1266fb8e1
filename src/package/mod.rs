//! Package manager backends.
//!
//! Each backend implements [`PackageCommandFactory`], which turns an abstract
//! package operation into a [`CommandDescriptor`] without running anything.
//! [`PackageManager`] composes those descriptors with a working container.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use strum::{Display, EnumIter};

use crate::backend::parse_identifier;
use crate::command::CommandDescriptor;
use crate::error::RsocistrapError;
use crate::serde_helpers::impl_display_fromstr_serde;

mod apk;
mod apt;
mod dnf;
mod manager;
mod pacman;
mod xbps;
mod zypper;

pub use apk::ApkCommandFactory;
pub use apt::AptCommandFactory;
pub use dnf::DnfCommandFactory;
pub use manager::PackageManager;
pub use pacman::PacmanCommandFactory;
pub use xbps::XbpsCommandFactory;
pub use zypper::ZypperCommandFactory;

static DEBIAN_PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-z][+\-.0-9a-z]*[0-9a-z]$").expect("valid regex"));

static LOWERCASE_PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-z][+\-.0-9_a-z]*[0-9a-z]$").expect("valid regex"));

static MIXED_CASE_PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Za-z][+\-.0-9A-Z_a-z]*[0-9A-Za-z]$").expect("valid regex")
});

/// A package manager. `Unknown` is the unset value and never executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum PackageBackend {
    #[default]
    #[strum(to_string = "unknown")]
    Unknown,
    #[strum(to_string = "APK")]
    Apk,
    #[strum(to_string = "APT")]
    Apt,
    #[strum(to_string = "DNF")]
    Dnf,
    Pacman,
    #[strum(to_string = "XBPS")]
    Xbps,
    Zypper,
}

impl PackageBackend {
    /// The syntax of a valid package name for this ecosystem.
    pub fn package_name_regex(self) -> Option<&'static Regex> {
        match self {
            Self::Unknown => None,
            Self::Apt => Some(&DEBIAN_PACKAGE_NAME),
            Self::Apk | Self::Pacman => Some(&LOWERCASE_PACKAGE_NAME),
            Self::Dnf | Self::Xbps | Self::Zypper => Some(&MIXED_CASE_PACKAGE_NAME),
        }
    }

    pub fn is_valid_package_name(self, name: &str) -> bool {
        self.package_name_regex().is_some_and(|re| re.is_match(name))
    }
}

impl FromStr for PackageBackend {
    type Err = RsocistrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_identifier("package", s, &[])
    }
}

impl_display_fromstr_serde!(PackageBackend, expecting: "a package backend name such as \"APT\"");

/// Parses the lines of a list-installed transcript into package names.
pub type ParseFn = fn(&[&str]) -> Result<Vec<String>, RsocistrapError>;

/// The list-installed command together with the parser for its output.
#[derive(Debug, Clone)]
pub struct ListCommand {
    pub command: CommandDescriptor,
    pub parse: ParseFn,
}

/// Builds package manager command lines and their required capabilities.
pub trait PackageCommandFactory: Send + Sync {
    /// The backend this factory builds commands for.
    fn backend(&self) -> PackageBackend;

    /// Removes downloaded package files and cached metadata.
    fn clean_cache(&self) -> CommandDescriptor;

    /// Installs `packages` without prompting.
    fn install(&self, packages: &[String]) -> CommandDescriptor;

    /// Lists installed packages in the tool's native format.
    fn list_installed(&self) -> ListCommand;

    /// Refreshes the package index. A no-op for tools that refresh implicitly.
    fn update_index(&self) -> CommandDescriptor;

    /// Upgrades every installed package without prompting.
    fn upgrade(&self) -> CommandDescriptor;

    /// Whether install and upgrade must be preceded by [`Self::update_index`].
    fn requires_index_refresh(&self) -> bool {
        false
    }
}

/// Returns the command factory for `backend`. Fails for the unset value.
pub fn new_command_factory(
    backend: PackageBackend,
) -> Result<Box<dyn PackageCommandFactory>, RsocistrapError> {
    match backend {
        PackageBackend::Apk => Ok(Box::new(ApkCommandFactory)),
        PackageBackend::Apt => Ok(Box::new(AptCommandFactory)),
        PackageBackend::Dnf => Ok(Box::new(DnfCommandFactory)),
        PackageBackend::Pacman => Ok(Box::new(PacmanCommandFactory)),
        PackageBackend::Xbps => Ok(Box::new(XbpsCommandFactory)),
        PackageBackend::Zypper => Ok(Box::new(ZypperCommandFactory)),
        PackageBackend::Unknown => Err(RsocistrapError::UnsupportedBackend {
            axis: "package",
            name: backend.to_string(),
        }),
    }
}

/// Builds `argv` from a fixed prefix followed by `packages`.
pub(crate) fn argv_with_packages(prefix: &[&str], packages: &[String]) -> Vec<String> {
    prefix
        .iter()
        .map(|s| s.to_string())
        .chain(packages.iter().cloned())
        .collect()
}

/// Parser for tools that print one bare package name per line.
pub(crate) fn parse_one_name_per_line(lines: &[&str]) -> Result<Vec<String>, RsocistrapError> {
    lines
        .iter()
        .map(|line| {
            let name = line.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                Err(RsocistrapError::Parse(format!(
                    "expected a single package name in line {:?}",
                    line
                )))
            } else {
                Ok(name.to_string())
            }
        })
        .collect()
}
