//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::config::Config;
use crate::configure::TapOptions;
use crate::pattern::PatternSpec;

/// Replay command arguments.
///
/// Flags override the `[tap]` section of the configuration.
#[derive(Debug, Args)]
pub struct ReplayCommand {
    /// Capture file to replay, or `-` for stdin
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Log filter regex
    #[arg(short = 'f', long, value_name = "REGEX")]
    pub log_filter: Option<String>,

    /// Drop outbound stanzas matching this regex
    #[arg(short = 'd', long, value_name = "REGEX")]
    pub drop: Option<String>,

    /// Stanza log level (error, warn, info, log, debug)
    #[arg(short, long)]
    pub level: Option<String>,

    /// Print wall-clock timestamps instead of deltas
    #[arg(short, long)]
    pub absolute_time: bool,

    /// Rewrite ICE addresses and credentials
    #[arg(short, long)]
    pub thaw_ice: bool,

    /// Stop rewriting this many milliseconds after the first rewrite
    #[arg(short, long, value_name = "MS")]
    pub refreeze: Option<u64>,

    /// Keep the log filter in memory instead of the settings database
    #[arg(long)]
    pub no_persist: bool,
}

impl ReplayCommand {
    /// Whether the capture is read from stdin.
    #[must_use]
    pub fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }

    /// The log filter to configure, falling back to the configuration.
    #[must_use]
    pub fn log_filter_spec(&self, config: &Config) -> Option<PatternSpec> {
        self.log_filter
            .clone()
            .map(PatternSpec::from)
            .or_else(|| config.log_filter_spec())
    }

    /// The level name to configure, falling back to the configuration.
    #[must_use]
    pub fn level<'a>(&'a self, config: &'a Config) -> &'a str {
        self.level.as_deref().unwrap_or(&config.tap.level)
    }

    /// Tap options with the flags layered over the configuration.
    #[must_use]
    pub fn tap_options(&self, config: &Config) -> TapOptions {
        let mut options = config.tap_options();
        options.absolute_time |= self.absolute_time;
        options.thaw_ice |= self.thaw_ice;
        if let Some(drop) = &self.drop {
            options.filter_realtime = Some(PatternSpec::from(drop.clone()));
        }
        if let Some(ms) = self.refreeze {
            options.refreeze = Some(std::time::Duration::from_millis(ms));
        }
        options
    }
}

/// Format-delta command arguments.
#[derive(Debug, Args)]
pub struct FormatDeltaCommand {
    /// Deltas in milliseconds
    #[arg(required = true, allow_negative_numbers = true, value_name = "MS")]
    pub deltas: Vec<i64>,
}

/// Persisted log filter commands.
#[derive(Debug, Subcommand)]
pub enum FilterCommand {
    /// Show the persisted log filter
    Show,

    /// Persist a new log filter
    Set {
        /// Regex to match stanzas against
        pattern: String,
    },

    /// Remove the persisted log filter
    Clear,
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
