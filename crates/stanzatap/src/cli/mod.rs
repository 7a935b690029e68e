//! Command-line interface for stanzatap.
//!
//! This module provides the CLI structure for the `stanzatap` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, FilterCommand, FormatDeltaCommand, ReplayCommand};

/// stanzatap - Inspect and rewrite live XML stanza traffic
///
/// Replays captured signalling traffic through the tap pipeline and manages
/// the persisted log filter.
#[derive(Debug, Parser)]
#[command(name = "stanzatap")]
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
    /// Replay a capture file through the tap
    Replay(ReplayCommand),

    /// Format millisecond deltas the way log lines show them
    FormatDelta(FormatDeltaCommand),

    /// Manage the persisted log filter
    #[command(subcommand)]
    Filter(FilterCommand),

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
