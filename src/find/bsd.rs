use super::{FindBackend, FindCommandFactory, PRUNED_DIR};
use crate::capability::Capability;
use crate::command::{CommandDescriptor, to_argv};

/// FreeBSD-derived `find`, as shipped by Chimera Linux. `-x` takes the place
/// of `-xdev` and must precede the search root.
#[derive(Debug, Clone, Copy, Default)]
pub struct BsdCommandFactory;

impl FindCommandFactory for BsdCommandFactory {
    fn backend(&self) -> FindBackend {
        FindBackend::Bsd
    }

    fn find_special(&self) -> CommandDescriptor {
        CommandDescriptor::new(
            to_argv(&[
                "find", "-x", "/", "-path", PRUNED_DIR, "-prune", "-o", "-type", "f", "-perm",
                "+u=s,g=s", "-print",
            ]),
            [Capability::DacReadSearch],
        )
    }
}
