//! Linux capabilities granted to commands run inside the working container.
//!
//! Each command descriptor carries exactly the capabilities its tool needs
//! on top of the empty default set the working container is created with.
//! Sets are never merged across commands.

use std::collections::BTreeSet;
use std::fmt;

use strum::{Display, EnumIter, EnumString};

/// A single Linux capability, displayed in its `CAP_*` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter)]
pub enum Capability {
    #[strum(serialize = "CAP_CHOWN")]
    Chown,
    #[strum(serialize = "CAP_DAC_OVERRIDE")]
    DacOverride,
    #[strum(serialize = "CAP_DAC_READ_SEARCH")]
    DacReadSearch,
    #[strum(serialize = "CAP_FOWNER")]
    Fowner,
    #[strum(serialize = "CAP_FSETID")]
    Fsetid,
    #[strum(serialize = "CAP_SETFCAP")]
    Setfcap,
    #[strum(serialize = "CAP_SETGID")]
    Setgid,
    #[strum(serialize = "CAP_SETUID")]
    Setuid,
    #[strum(serialize = "CAP_SYS_CHROOT")]
    SysChroot,
}

/// An ordered, de-duplicated set of capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
    /// The empty set.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capability: Capability) -> bool {
        self.0.insert(capability)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    /// Returns the capability names, e.g. `["CAP_CHOWN", "CAP_FOWNER"]`.
    pub fn names(&self) -> Vec<String> {
        self.iter().map(|c| c.to_string()).collect()
    }
}

impl<const N: usize> From<[Capability; N]> for Capabilities {
    fn from(caps: [Capability; N]) -> Self {
        Self(caps.into_iter().collect())
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(","))
    }
}
