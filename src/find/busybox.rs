use super::{FindBackend, FindCommandFactory, PRUNED_DIR};
use crate::capability::Capabilities;
use crate::command::{CommandDescriptor, to_argv};

/// BusyBox `find`, which only understands octal `-perm` masks.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusyBoxCommandFactory;

impl FindCommandFactory for BusyBoxCommandFactory {
    fn backend(&self) -> FindBackend {
        FindBackend::BusyBox
    }

    fn find_special(&self) -> CommandDescriptor {
        CommandDescriptor::new(
            to_argv(&[
                "find", "/", "-xdev", "-path", PRUNED_DIR, "-prune", "-o", "-type", "f", "(",
                "-perm", "-4000", "-o", "-perm", "-2000", ")", "-print",
            ]),
            Capabilities::none(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_special() {
        let desc = BusyBoxCommandFactory.find_special();
        assert_eq!(
            desc.argv.join(" "),
            "find / -xdev -path /home -prune -o -type f ( -perm -4000 -o -perm -2000 ) -print"
        );
        assert!(desc.capabilities.is_empty());
    }
}
