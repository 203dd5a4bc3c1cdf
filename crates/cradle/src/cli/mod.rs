//! Command-line interface for cradle.
//!
//! This module provides the CLI structure for the `cradle` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddChildCommand, ChildCommand, ConfigCommand, Credentials, OutputFormat, RegisterCommand,
    SosCommand, StatusCommand,
};

/// cradle - Lost-child contact cards for your family
///
/// Register an account, record your children and their guardians, and print
/// an identification card for each child.
#[derive(Debug, Parser)]
#[command(name = "cradle")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account
    Register(RegisterCommand),

    /// Manage child records
    #[command(subcommand)]
    Child(ChildCommand),

    /// Raise or list SOS alerts
    #[command(subcommand)]
    Sos(SosCommand),

    /// Show what is stored
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "cradle");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_levels() {
        use crate::logging::Verbosity;

        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_register() {
        let args = [
            "cradle", "register", "-n", "Pat", "-e", "pat@example.com", "-p", "abcde1!",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Register(cmd) = cli.command else {
            panic!("expected register");
        };
        assert_eq!(cmd.name, "Pat");
        assert_eq!(cmd.email, "pat@example.com");
    }

    #[test]
    fn test_parse_child_add_with_guardians() {
        let args = [
            "cradle",
            "child",
            "add",
            "-e",
            "pat@example.com",
            "-p",
            "abcde1!",
            "-n",
            "Timmy",
            "-a",
            "5",
            "-g",
            "Ann,ann@x.com,555",
            "-g",
            "Bob,,",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Child(ChildCommand::Add(cmd)) = cli.command else {
            panic!("expected child add");
        };
        assert_eq!(cmd.name, "Timmy");
        assert_eq!(cmd.age, 5);
        assert_eq!(cmd.guardian.len(), 2);
        assert_eq!(cmd.guardian[0].email, "ann@x.com");
        assert_eq!(cmd.guardian[1].name, "Bob");
    }

    #[test]
    fn test_parse_rejects_blank_guardian() {
        let args = [
            "cradle", "child", "add", "-e", "a@x.com", "-p", "abcde1!", "-n", "Timmy", "-g", ",,",
        ];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_child_card() {
        let args = [
            "cradle", "child", "card", "-e", "a@x.com", "-p", "abcde1!", "3", "-o", "card.txt",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Child(ChildCommand::Card { id, output, .. }) = cli.command else {
            panic!("expected child card");
        };
        assert_eq!(id, "3");
        assert_eq!(output, Some(PathBuf::from("card.txt")));
    }

    #[test]
    fn test_parse_sos_list() {
        let cli = Cli::try_parse_from(["cradle", "sos", "list"]).unwrap();
        assert!(matches!(cli.command, Command::Sos(SosCommand::List { .. })));
    }

    #[test]
    fn test_parse_with_config() {
        let args = ["cradle", "-c", "/custom/config.toml", "status"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_with_verbose_and_quiet() {
        let cli = Cli::try_parse_from(["cradle", "-v", "status"]).unwrap();
        assert_eq!(cli.verbose, 1);

        let cli = Cli::try_parse_from(["cradle", "-q", "status"]).unwrap();
        assert!(cli.quiet);
    }
}
