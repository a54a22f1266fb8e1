//! Backend selection across the package, user and find axes.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::distro::Distro;
use crate::error::RsocistrapError;
use crate::find::FindBackend;
use crate::package::PackageBackend;
use crate::user::UserBackend;

/// Parses a backend identifier from its display string or one of `aliases`.
///
/// Matching is ASCII case-insensitive. The unset (`Default`) value is never
/// produced, even when its display string is given.
pub(crate) fn parse_identifier<T>(
    axis: &'static str,
    s: &str,
    aliases: &[(&str, T)],
) -> Result<T, RsocistrapError>
where
    T: IntoEnumIterator + Display + Default + PartialEq + Copy,
{
    let unset = T::default();
    T::iter()
        .filter(|b| *b != unset)
        .find(|b| b.to_string().eq_ignore_ascii_case(s))
        .or_else(|| {
            aliases
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(s))
                .map(|(_, b)| *b)
        })
        .ok_or_else(|| RsocistrapError::UnsupportedBackend {
            axis,
            name: s.to_string(),
        })
}

/// The backend chosen for each axis. Unset axes fall back to the distro defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Backends {
    #[serde(default)]
    pub package: PackageBackend,
    #[serde(default)]
    pub user: UserBackend,
    #[serde(default)]
    pub find: FindBackend,
}

impl Backends {
    /// The distro defaults on every axis.
    pub fn for_distro(distro: Distro) -> Self {
        Self {
            package: distro.default_package_backend(),
            user: distro.default_user_backend(),
            find: distro.default_find_backend(),
        }
    }

    /// Replaces every unset axis with the distro default.
    pub fn fill(&mut self, distro: Distro) {
        if self.package == PackageBackend::Unknown {
            self.package = distro.default_package_backend();
        }
        if self.user == UserBackend::Unknown {
            self.user = distro.default_user_backend();
        }
        if self.find == FindBackend::Unknown {
            self.find = distro.default_find_backend();
        }
    }

    /// Fails if any axis is still unset.
    pub fn validate(&self) -> Result<(), RsocistrapError> {
        if self.package == PackageBackend::Unknown {
            return Err(RsocistrapError::Validation("package backend is not set".to_string()));
        }
        if self.user == UserBackend::Unknown {
            return Err(RsocistrapError::Validation("user backend is not set".to_string()));
        }
        if self.find == FindBackend::Unknown {
            return Err(RsocistrapError::Validation("find backend is not set".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_keeps_explicit_selection() {
        let mut backends = Backends {
            package: PackageBackend::Apk,
            ..Default::default()
        };
        backends.fill(Distro::Debian);
        assert_eq!(backends.package, PackageBackend::Apk);
        assert_eq!(backends.user, UserBackend::Shadow);
        assert_eq!(backends.find, FindBackend::Gnu);
        assert!(backends.validate().is_ok());
    }

    #[test]
    fn test_unfilled_backends_fail_validation() {
        let err = Backends::default().validate().unwrap_err();
        assert_eq!(err.to_string(), "validation error: package backend is not set");
    }

    #[test]
    fn test_for_distro_matches_fill() {
        let mut filled = Backends::default();
        filled.fill(Distro::Void);
        assert_eq!(filled, Backends::for_distro(Distro::Void));
    }
}
