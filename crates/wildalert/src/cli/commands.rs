//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Watch command arguments.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Watch without a signed-in session, using the fallback address
    #[arg(long)]
    pub anonymous: bool,

    /// Watch the local capture device instead of the remote feed
    #[arg(short, long)]
    pub local: bool,

    /// Capture device to use with --local (defaults to the configured device)
    #[arg(short, long, value_name = "PATH")]
    pub device: Option<PathBuf>,
}

/// Alert command arguments.
#[derive(Debug, Args)]
pub struct AlertCommand {
    /// What was spotted
    #[arg(short, long, default_value = "lion")]
    pub animal: String,

    /// Where it was spotted (defaults to the configured location)
    #[arg(short = 'L', long)]
    pub location: Option<String>,
}

/// Session record commands.
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Record a signed-in session
    Login {
        /// Email address of the signed-in user
        #[arg(short, long)]
        email: String,

        /// Session token issued by the identity provider
        #[arg(short, long)]
        token: String,

        /// User id issued by the identity provider
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Remove the session record
    Logout,

    /// Show the current session
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
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
