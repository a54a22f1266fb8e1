//! Tests for shell completion generation.

use std::process::Command;

use anyhow::Result;
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::{Shell, generate};
use rsocistrap::cli::{Cli, Commands};

#[test]
fn test_completions_command_parsing() {
    let shells = [
        ("bash", Shell::Bash),
        ("zsh", Shell::Zsh),
        ("fish", Shell::Fish),
        ("powershell", Shell::PowerShell),
        ("elvish", Shell::Elvish),
    ];

    for (shell_str, expected_shell) in shells {
        let args = Cli::parse_from(["rsocistrap", "completions", shell_str]);
        match args.command {
            Commands::Completions(opts) => {
                assert_eq!(opts.shell, expected_shell, "Mismatched shell for '{}'", shell_str);
            }
            _ => panic!("Expected Completions command for shell '{}'", shell_str),
        }
    }
}

#[test]
fn test_completions_generation() {
    let mut cmd = Cli::command();
    let mut buffer = Vec::new();

    for shell in Shell::value_variants() {
        buffer.clear();
        generate(*shell, &mut cmd, "rsocistrap", &mut buffer);
        assert!(!buffer.is_empty(), "Generated completion for {:?} was empty", shell);
    }
}

#[test]
fn test_completion_contents() -> Result<()> {
    let mut cmd = Cli::command();

    let test_cases = [
        (Shell::Bash, &["rsocistrap", "build", "validate", "completions"] as &[_]),
        (Shell::Zsh, &["#compdef rsocistrap", "build", "validate", "--hash-spec"]),
        (Shell::Fish, &["rsocistrap", "build", "validate", "completions"]),
    ];

    for (shell, patterns) in test_cases {
        let mut buffer = Vec::new();
        generate(shell, &mut cmd, "rsocistrap", &mut buffer);
        let output = String::from_utf8(buffer)?;

        for pattern in patterns {
            assert!(
                output.contains(pattern),
                "Pattern '{}' not found in {:?} completions",
                pattern,
                shell
            );
        }
    }

    Ok(())
}

#[test]
fn test_cli_completions_output() -> Result<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_rsocistrap"))
        .args(["completions", "bash"])
        .output()?;

    assert!(output.status.success(), "completions bash failed");
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("rsocistrap"));
    assert!(stdout.contains("build"));
    Ok(())
}

#[test]
fn test_invalid_shell_rejected() {
    let result = Cli::try_parse_from(["rsocistrap", "completions", "invalid-shell"]);
    assert!(result.is_err(), "Expected parsing to fail for invalid shell");
}
