//! shadow-utils `useradd`.

use super::{CreateUserOptions, UserBackend, UserCommandFactory};
use crate::capability::{Capabilities, Capability};
use crate::command::{CommandArgsBuilder, CommandDescriptor, FlagValueStyle};

/// SSSD cache invalidation helper that `useradd` runs when it is installed.
const SSS_CACHE: &str = "sss_cache";

/// Group membership is set by `useradd` itself, so adding a user to a group
/// is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShadowCommandFactory;

impl UserCommandFactory for ShadowCommandFactory {
    fn backend(&self) -> UserBackend {
        UserBackend::Shadow
    }

    fn create_user(
        &self,
        name: &str,
        options: &CreateUserOptions,
        cache_helper_present: bool,
    ) -> CommandDescriptor {
        let mut args = CommandArgsBuilder::new("useradd");
        if options.id > 0 {
            args.push_flag_value("--uid", &options.id.to_string(), FlagValueStyle::Separate);
        }
        args.push_flag_if("--user-group", options.user_group);
        if !options.groups.is_empty() {
            args.push_flag_value("--groups", &options.groups.join(","), FlagValueStyle::Separate);
        }
        if let Some(comment) = &options.comment {
            args.push_flag("--comment");
            args.push_arg(comment.as_str());
        }
        args.push_flag_if("--create-home", options.create_home);
        if let Some(shell) = &options.login_shell {
            args.push_flag_value("--shell", shell, FlagValueStyle::Separate);
        }
        args.push_arg(name);

        // useradd also holds CAP_DAC_READ_SEARCH and CAP_FSETID but succeeds without them.
        let mut capabilities = Capabilities::from([
            // Chown files copied from /etc/skel and the mail spool entry.
            Capability::Chown,
            // Open /etc/shadow, /etc/gshadow and the copied skeleton files.
            Capability::DacOverride,
            // Set owner and mode of the temporary files that replace passwd,
            // shadow, group, gshadow, subuid and subgid, of the home directory,
            // and of the skeleton files copied into it.
            Capability::Fowner,
        ]);
        if cache_helper_present {
            // sss_cache must transiently assume an effective root identity.
            capabilities.insert(Capability::Setgid);
            capabilities.insert(Capability::Setuid);
        }

        CommandDescriptor::new(args.into_args(), capabilities)
    }

    fn add_user_to_group(&self, _user: &str, _group: &str) -> CommandDescriptor {
        CommandDescriptor::noop()
    }

    fn cache_helper(&self) -> Option<&'static str> {
        Some(SSS_CACHE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_all_options() {
        let options = CreateUserOptions {
            id: 1000,
            comment: Some("Developer".to_string()),
            user_group: true,
            groups: vec!["wheel".to_string(), "video".to_string()],
            create_home: true,
            login_shell: Some("/usr/bin/zsh".to_string()),
        };
        let desc = ShadowCommandFactory.create_user("dev", &options, false);
        assert_eq!(
            desc.argv,
            vec![
                "useradd",
                "--uid",
                "1000",
                "--user-group",
                "--groups",
                "wheel,video",
                "--comment",
                "Developer",
                "--create-home",
                "--shell",
                "/usr/bin/zsh",
                "dev"
            ]
        );
    }

    #[test]
    fn test_capabilities_without_cache_helper() {
        let desc = ShadowCommandFactory.create_user("dev", &CreateUserOptions::default(), false);
        assert_eq!(desc.argv, vec!["useradd", "dev"]);
        assert_eq!(
            desc.capabilities.names(),
            vec!["CAP_CHOWN", "CAP_DAC_OVERRIDE", "CAP_FOWNER"]
        );
    }

    #[test]
    fn test_capabilities_with_cache_helper() {
        let desc = ShadowCommandFactory.create_user("dev", &CreateUserOptions::default(), true);
        assert_eq!(
            desc.capabilities.names(),
            vec!["CAP_CHOWN", "CAP_DAC_OVERRIDE", "CAP_FOWNER", "CAP_SETGID", "CAP_SETUID"]
        );
    }

    #[test]
    fn test_add_user_to_group_is_noop() {
        assert!(ShadowCommandFactory.add_user_to_group("dev", "wheel").is_noop());
        assert_eq!(ShadowCommandFactory.cache_helper(), Some("sss_cache"));
    }
}
