use super::{FindBackend, FindCommandFactory, PRUNED_DIR};
use crate::capability::Capability;
use crate::command::{CommandDescriptor, to_argv};

/// GNU findutils.
#[derive(Debug, Clone, Copy, Default)]
pub struct GnuCommandFactory;

impl FindCommandFactory for GnuCommandFactory {
    fn backend(&self) -> FindBackend {
        FindBackend::Gnu
    }

    fn find_special(&self) -> CommandDescriptor {
        CommandDescriptor::new(
            to_argv(&[
                "find", "/", "-xdev", "-path", PRUNED_DIR, "-prune", "-o", "-type", "f", "-perm",
                "/u=s,g=s", "-print",
            ]),
            // Traverse directories the namespaced root does not own.
            [Capability::DacReadSearch],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_special() {
        let desc = GnuCommandFactory.find_special();
        assert_eq!(
            desc.argv.join(" "),
            "find / -xdev -path /home -prune -o -type f -perm /u=s,g=s -print"
        );
        assert_eq!(desc.capabilities.names(), vec!["CAP_DAC_READ_SEARCH"]);
    }
}
