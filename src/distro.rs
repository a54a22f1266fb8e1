//! Supported Linux distributions and their per-axis defaults.
//!
//! Every lookup here is a pure table: nothing inspects the base image, so a
//! distro that does not match the image surfaces only as a failing command
//! later in the build.

use std::str::FromStr;

use strum::{Display, EnumIter, IntoEnumIterator};

use crate::error::RsocistrapError;
use crate::find::FindBackend;
use crate::package::PackageBackend;
use crate::serde_helpers::impl_display_fromstr_serde;
use crate::user::UserBackend;

/// A supported target distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Distro {
    Alpine,
    Arch,
    Chimera,
    Debian,
    Fedora,
    #[strum(to_string = "openSUSE")]
    OpenSuse,
    Void,
}

impl Distro {
    pub fn default_package_backend(self) -> PackageBackend {
        match self {
            Self::Alpine | Self::Chimera => PackageBackend::Apk,
            Self::Arch => PackageBackend::Pacman,
            Self::Debian => PackageBackend::Apt,
            Self::Fedora => PackageBackend::Dnf,
            Self::OpenSuse => PackageBackend::Zypper,
            Self::Void => PackageBackend::Xbps,
        }
    }

    pub fn default_user_backend(self) -> UserBackend {
        match self {
            Self::Alpine => UserBackend::BusyBox,
            Self::Arch
            | Self::Chimera
            | Self::Debian
            | Self::Fedora
            | Self::OpenSuse
            | Self::Void => UserBackend::Shadow,
        }
    }

    pub fn default_find_backend(self) -> FindBackend {
        match self {
            Self::Alpine => FindBackend::BusyBox,
            Self::Chimera => FindBackend::Bsd,
            Self::Arch | Self::Debian | Self::Fedora | Self::OpenSuse | Self::Void => {
                FindBackend::Gnu
            }
        }
    }

    /// Login shell assigned by the distro's user tools when none is requested.
    pub fn default_shell(self) -> &'static str {
        match self {
            Self::Alpine => "/bin/ash",
            Self::Arch | Self::Debian | Self::Fedora | Self::OpenSuse => "/bin/bash",
            Self::Chimera => "/bin/sh",
            Self::Void => "/bin/dash",
        }
    }

    /// Environment injected into every command run in the working container.
    pub fn default_env(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Debian => &[("DEBIAN_FRONTEND", "noninteractive")],
            _ => &[],
        }
    }
}

impl FromStr for Distro {
    type Err = RsocistrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::iter()
            .find(|d| d.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| RsocistrapError::Config(format!("unsupported distro: {}", s)))
    }
}

impl_display_fromstr_serde!(Distro, expecting: "a distro name such as \"Debian\"");
