//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::child::Guardian;

/// Credentials for commands that act on behalf of an account.
#[derive(Clone, Args)]
pub struct Credentials {
    /// Account email
    #[arg(short, long, env = "CRADLE_EMAIL")]
    pub email: String,

    /// Account password
    #[arg(short, long, env = "CRADLE_PASSWORD", hide_env_values = true)]
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Register command arguments.
#[derive(Debug, Args)]
pub struct RegisterCommand {
    /// Full name shown after login
    #[arg(short, long)]
    pub name: String,

    /// Account email
    #[arg(short, long)]
    pub email: String,

    /// Password (6+ characters with a digit and a special character)
    #[arg(short, long)]
    pub password: String,
}

/// Child record commands.
#[derive(Debug, Subcommand)]
pub enum ChildCommand {
    /// Add a child and render its identification card
    Add(AddChildCommand),

    /// List your children
    List {
        #[command(flatten)]
        credentials: Credentials,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },

    /// Show or save a child's identification card
    Card {
        #[command(flatten)]
        credentials: Credentials,

        /// Child ID
        id: String,

        /// Write the card to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

/// Add-child command arguments.
#[derive(Debug, Args)]
pub struct AddChildCommand {
    #[command(flatten)]
    pub credentials: Credentials,

    /// Child's name
    #[arg(short, long)]
    pub name: String,

    /// Child's age
    #[arg(short, long, default_value = "0")]
    pub age: u32,

    /// Notes about the child
    #[arg(long, default_value = "")]
    pub notes: String,

    /// Photo file to attach
    #[arg(long, value_name = "FILE")]
    pub photo: Option<PathBuf>,

    /// Guardian contact as "name,email,phone" (up to two)
    #[arg(short, long, value_name = "CONTACT")]
    pub guardian: Vec<Guardian>,
}

/// SOS alert commands.
#[derive(Debug, Subcommand)]
pub enum SosCommand {
    /// Raise an alert for one of your children
    Raise {
        #[command(flatten)]
        credentials: Credentials,

        /// Child ID
        id: String,
    },

    /// List alerts raised in this run
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// JSON output
    Json,
}
