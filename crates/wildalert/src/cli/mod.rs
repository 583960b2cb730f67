//! Command-line interface for wildalert.
//!
//! This module provides the CLI structure for the `wildalert` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{AlertCommand, ConfigCommand, SessionCommand, StatusCommand, WatchCommand};

/// wildalert - Watch a wildlife camera feed and raise sighting alerts
///
/// Shows the live detection feed for the signed-in ranger, retries it while
/// the stream is down, and sends manual sighting alerts.
#[derive(Debug, Parser)]
#[command(name = "wildalert")]
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
    /// Watch the live feed
    Watch(WatchCommand),

    /// Send a sighting alert
    Alert(AlertCommand),

    /// Manage the signed-in session
    #[command(subcommand)]
    Session(SessionCommand),

    /// List local capture devices
    Devices,

    /// Show session and endpoint status
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
