//! BusyBox `adduser` and `addgroup`.

use super::{CreateUserOptions, UserBackend, UserCommandFactory};
use crate::capability::{Capabilities, Capability};
use crate::command::{CommandArgsBuilder, CommandDescriptor, FlagValueStyle, to_argv};

#[derive(Debug, Clone, Copy, Default)]
pub struct BusyBoxCommandFactory;

impl UserCommandFactory for BusyBoxCommandFactory {
    fn backend(&self) -> UserBackend {
        UserBackend::BusyBox
    }

    fn create_user(
        &self,
        name: &str,
        options: &CreateUserOptions,
        _cache_helper_present: bool,
    ) -> CommandDescriptor {
        let mut args = CommandArgsBuilder::new("adduser");
        args.push_flag("-D");
        if options.id > 0 {
            args.push_flag_value("-u", &options.id.to_string(), FlagValueStyle::Separate);
        }
        if let Some(comment) = &options.comment {
            args.push_flag("-g");
            args.push_arg(comment.as_str());
        }
        if options.create_home {
            args.push_flag_value("-h", &format!("/home/{}", name), FlagValueStyle::Separate);
        } else {
            args.push_flag("-H");
        }
        if let Some(shell) = &options.login_shell {
            args.push_flag_value("-s", shell, FlagValueStyle::Separate);
        }
        args.push_arg(name);

        // adduser also holds CAP_DAC_OVERRIDE and CAP_FSETID but succeeds without them.
        CommandDescriptor::new(
            args.into_args(),
            // CHOWN: hand /home/<name> to the new user.
            // FOWNER: set mode and owner of /home/<name> and of the temporary
            // files written while editing /etc/passwd, /etc/shadow and /etc/group.
            [Capability::Chown, Capability::Fowner],
        )
    }

    fn add_user_to_group(&self, user: &str, group: &str) -> CommandDescriptor {
        CommandDescriptor::new(to_argv(&["addgroup", user, group]), Capabilities::none())
    }
}
